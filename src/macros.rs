//! Declarative macros for protocol tables (command codes, versions, error codes).

/// Declares the `CommandType` enum along with a lookup from its wire value.
macro_rules! define_command_type {
    ($($name:ident = $val:expr),* $(,)?) => {
        /// Tuya command codes carried in the frame header.
        #[repr(u32)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum CommandType {
            $($name = $val),*
        }

        impl CommandType {
            pub fn from_u32(value: u32) -> Option<Self> {
                match value {
                    $(v if v == $val => Some(CommandType::$name),)*
                    _ => None,
                }
            }
        }

        impl From<CommandType> for u32 {
            fn from(cmd: CommandType) -> u32 {
                cmd as u32
            }
        }
    };
}

/// Declares the `Version` enum of supported protocol revisions.
///
/// Parsing any other version string fails with `TuyaError::UnsupportedVersion`.
macro_rules! define_version {
    ($($name:ident = $s:literal),* $(,)?) => {
        /// Supported Tuya protocol versions.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Version {
            $($name),*
        }

        impl Version {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Version::$name => $s),*
                }
            }

            pub fn as_bytes(&self) -> &'static [u8] {
                self.as_str().as_bytes()
            }
        }

        impl std::str::FromStr for Version {
            type Err = $crate::error::TuyaError;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                match s.trim() {
                    $($s => Ok(Version::$name),)*
                    other => Err($crate::error::TuyaError::UnsupportedVersion(other.to_string())),
                }
            }
        }

        impl std::fmt::Display for Version {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl serde::Serialize for Version {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }
    };
}

/// Declares numeric error code constants and `get_error_message`.
macro_rules! define_error_codes {
    ($($name:ident = $code:literal => $msg:literal),* $(,)?) => {
        $(pub const $name: u32 = $code;)*

        /// Returns the human readable message for a numeric error code.
        pub fn get_error_message(code: u32) -> &'static str {
            match code {
                $($code => $msg,)*
                _ => "Unknown Error",
            }
        }
    };
}
