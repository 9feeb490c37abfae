//! Backend identity resolution.
//!
//! Normalizes a device specification (tag string, structured handle, or
//! nothing at all) into one of the canonical backend identities. Resolution
//! never fails: anything unrecognized degrades to [`BackendIdentity::Auto`],
//! which every backend-gated operation treats as "no accelerator".

use std::fmt;

use serde::{Deserialize, Serialize};

/// Tag used when no device is specified.
pub const AUTO_TAG: &str = "auto";

/// Canonical backend identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendIdentity {
    Cuda,
    Xpu,
    Mps,
    Cpu,
    Auto,
}

impl BackendIdentity {
    pub const ALL: [BackendIdentity; 5] = [
        BackendIdentity::Cuda,
        BackendIdentity::Xpu,
        BackendIdentity::Mps,
        BackendIdentity::Cpu,
        BackendIdentity::Auto,
    ];

    /// Match an exact lower-case backend tag. Case-preserving: "CUDA" is not "cuda".
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "cuda" => Some(Self::Cuda),
            "xpu" => Some(Self::Xpu),
            "mps" => Some(Self::Mps),
            "cpu" => Some(Self::Cpu),
            AUTO_TAG => Some(Self::Auto),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cuda => "cuda",
            Self::Xpu => "xpu",
            Self::Mps => "mps",
            Self::Cpu => "cpu",
            Self::Auto => AUTO_TAG,
        }
    }

    /// Whether this identity names an accelerator backend.
    pub fn is_accelerator(&self) -> bool {
        matches!(self, Self::Cuda | Self::Xpu | Self::Mps)
    }
}

impl fmt::Display for BackendIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured device handle: backend kind plus optional ordinal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceHandle {
    /// Declared backend type (e.g. "cuda").
    pub kind: String,

    /// Device ordinal, if one was given.
    pub index: Option<usize>,
}

impl DeviceHandle {
    pub fn new(kind: impl Into<String>, index: Option<usize>) -> Self {
        Self {
            kind: kind.into(),
            index,
        }
    }

    /// Parse "kind" or "kind:index". A non-numeric ordinal is dropped.
    pub fn parse(spec: &str) -> Self {
        match spec.split_once(':') {
            Some((kind, index)) => Self::new(kind, index.parse().ok()),
            None => Self::new(spec, None),
        }
    }
}

impl fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(index) => write!(f, "{}:{}", self.kind, index),
            None => f.write_str(&self.kind),
        }
    }
}

/// A device specification as held by the handler or passed by a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DeviceSpec {
    /// Free-form tag string ("cuda:0", "mps", "auto", ...).
    Tag(String),

    /// Structured handle; its declared kind is used as-is.
    Handle(DeviceHandle),
}

impl DeviceSpec {
    /// Backend tag: the handle's kind, or the string up to the first ':'.
    pub fn tag(&self) -> &str {
        match self {
            Self::Tag(s) => s.split(':').next().unwrap_or(""),
            Self::Handle(handle) => &handle.kind,
        }
    }

    /// Whether the specification carries no information.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Tag(s) => s.is_empty(),
            Self::Handle(handle) => handle.kind.is_empty(),
        }
    }
}

impl fmt::Display for DeviceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tag(s) => f.write_str(s),
            Self::Handle(handle) => fmt::Display::fmt(handle, f),
        }
    }
}

impl From<&str> for DeviceSpec {
    fn from(s: &str) -> Self {
        Self::Tag(s.to_string())
    }
}

impl From<String> for DeviceSpec {
    fn from(s: String) -> Self {
        Self::Tag(s)
    }
}

impl From<DeviceHandle> for DeviceSpec {
    fn from(handle: DeviceHandle) -> Self {
        Self::Handle(handle)
    }
}

/// Backend tag of an optional specification; absent, empty, or an empty
/// kind (":1") yields "auto".
pub fn backend_tag(spec: Option<&DeviceSpec>) -> &str {
    match spec.map(DeviceSpec::tag) {
        Some(tag) if !tag.is_empty() => tag,
        _ => AUTO_TAG,
    }
}

/// Resolve a specification to exactly one backend identity.
pub fn resolve(spec: Option<&DeviceSpec>) -> BackendIdentity {
    BackendIdentity::from_tag(backend_tag(spec)).unwrap_or(BackendIdentity::Auto)
}
