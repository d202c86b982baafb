use std::fmt;
use std::io;

#[derive(Debug)]
pub enum AccelError {
    /// A device node could not be opened or does not answer the probe ioctl.
    DeviceUnavailable(String),

    /// A device ioctl returned an error.
    Device {
        op: &'static str,
        source: io::Error,
    },

    /// Pixel depth or image format the hardware cannot handle.
    UnsupportedFormat(String),

    /// Not enough offscreen framebuffer memory for the next overlay frame.
    LimitExceeded,

    BufferOverflow,

    InvalidConfig(String),

    /// Port attribute name not known to the overlay adaptor.
    InvalidAttribute(String),

    Platform(anyhow::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccelErrorClass {
    InvalidInput,
    Unsupported,
    ResourceExhausted,
    Device,
    Fatal,
}

impl AccelError {
    pub fn device(op: &'static str, source: io::Error) -> Self {
        Self::Device { op, source }
    }

    pub fn class(&self) -> AccelErrorClass {
        match self {
            Self::InvalidConfig(_) | Self::InvalidAttribute(_) => AccelErrorClass::InvalidInput,
            Self::UnsupportedFormat(_) | Self::DeviceUnavailable(_) => {
                AccelErrorClass::Unsupported
            }
            Self::LimitExceeded => AccelErrorClass::ResourceExhausted,
            Self::Device { .. } => AccelErrorClass::Device,
            Self::BufferOverflow | Self::Platform(_) => AccelErrorClass::Fatal,
        }
    }

    /// Whether the caller can still get the work done on the CPU.
    pub fn is_software_fallback(&self) -> bool {
        matches!(
            self.class(),
            AccelErrorClass::Device | AccelErrorClass::Unsupported
        )
    }
}

impl fmt::Display for AccelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeviceUnavailable(message) => write!(f, "device not available: {message}"),
            Self::Device { op, source } => write!(f, "{op} ioctl failed: {source}"),
            Self::UnsupportedFormat(name) => write!(f, "unsupported pixel format: {name}"),
            Self::LimitExceeded => write!(
                f,
                "implementation limit exceeded: not enough offscreen framebuffer memory"
            ),
            Self::BufferOverflow => write!(f, "buffer offset or size overflow"),
            Self::InvalidConfig(message) => write!(f, "invalid display configuration: {message}"),
            Self::InvalidAttribute(name) => write!(f, "unknown port attribute: {name}"),
            Self::Platform(inner) => write!(f, "{inner}"),
        }
    }
}

impl std::error::Error for AccelError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Device { source, .. } => Some(source),
            Self::Platform(inner) => Some(inner.as_ref()),
            _ => None,
        }
    }
}

pub type AccelResult<T> = Result<T, AccelError>;
