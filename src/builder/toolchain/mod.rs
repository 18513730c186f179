//! Toolchain profiles for C/C++ compilers.
//!
//! A profile bundles the default executable and option template for each
//! tool role plus the flag spellings of its compiler family. Profiles are
//! plain data: targets copy them into their build plan records.
//!
//! Toolchain selection priority:
//! 1. An explicit toolchain on the target
//! 2. The first matching environment signal rule
//! 3. The resolver's default profile

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::settings::Role;
use crate::core::template::OptionTemplate;

mod detect;
mod gcc;
mod msvc;

pub use detect::{
    EnvSignals, SignalRule, ToolchainResolver, UnresolvedToolchain, VISUAL_STUDIO_SIGNALS,
};

/// The family of a toolchain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolchainFamily {
    /// GCC (GNU Compiler Collection)
    Gcc,
    /// Clang/LLVM
    Clang,
    /// Microsoft Visual C++
    Msvc,
}

impl ToolchainFamily {
    /// Get the family name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolchainFamily::Gcc => "gcc",
            ToolchainFamily::Clang => "clang",
            ToolchainFamily::Msvc => "msvc",
        }
    }
}

/// How a toolchain spells the flags the engine generates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagConventions {
    /// Prefix for include paths (`-I`, `/I`)
    pub include_prefix: String,
    /// Prefix for defines (`-D`, `/D`)
    pub define_prefix: String,
    /// Prefix for libraries (`-l`), empty when libraries are passed as files
    pub library_prefix: String,
    /// Suffix for libraries (`.lib` on MSVC)
    pub library_suffix: String,
    /// Prefix for library search paths (`-L`, `/LIBPATH:`)
    pub library_path_prefix: String,
    /// Debug-symbol and optimization flags for debug builds
    pub debug_flags: Vec<String>,
    /// Flag that turns off C++ exceptions
    pub no_exceptions_flag: String,
    /// Runtime libraries that only exist to support exceptions
    pub exception_runtime: Vec<String>,
    /// Static library file prefix (`lib` on Unix)
    pub static_lib_prefix: String,
    /// Static library file extension
    pub static_lib_extension: String,
    /// Executable file extension (may be empty)
    pub exe_extension: String,
}

/// A named bundle of default tool commands and flag conventions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolchainProfile {
    name: String,
    family: ToolchainFamily,
    commands: BTreeMap<Role, String>,
    templates: BTreeMap<Role, OptionTemplate>,
    conventions: FlagConventions,
}

impl ToolchainProfile {
    pub(crate) fn from_parts(
        name: &str,
        family: ToolchainFamily,
        commands: &[(Role, &str)],
        templates: &[(Role, &str)],
        conventions: FlagConventions,
    ) -> Self {
        ToolchainProfile {
            name: name.to_string(),
            family,
            commands: commands
                .iter()
                .map(|(role, cmd)| (*role, cmd.to_string()))
                .collect(),
            templates: templates
                .iter()
                .map(|(role, t)| (*role, OptionTemplate::new(*t)))
                .collect(),
            conventions,
        }
    }

    /// GCC profile.
    pub fn gcc() -> Self {
        gcc::profile("gcc", ToolchainFamily::Gcc)
    }

    /// Clang profile.
    pub fn clang() -> Self {
        gcc::profile("clang", ToolchainFamily::Clang)
    }

    /// Visual C++ profile.
    pub fn msvc() -> Self {
        msvc::profile()
    }

    /// Look up a built-in profile by name.
    ///
    /// Accepts `gcc`, `clang`, `msvc` and `visualcpp`.
    pub fn by_name(name: &str) -> Option<Self> {
        match name {
            "gcc" => Some(Self::gcc()),
            "clang" => Some(Self::clang()),
            "msvc" | "visualcpp" => Some(Self::msvc()),
            _ => None,
        }
    }

    /// Names accepted by [`ToolchainProfile::by_name`].
    pub fn known_names() -> &'static [&'static str] {
        &["gcc", "clang", "msvc", "visualcpp"]
    }

    /// Prefix every default command, e.g. `rx-elf-` or `/opt/cross/bin/arm-none-eabi-`.
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        for cmd in self.commands.values_mut() {
            *cmd = format!("{}{}", prefix, cmd);
        }
        self
    }

    /// Replace the default command for one role.
    pub fn with_command(mut self, role: Role, command: impl Into<String>) -> Self {
        self.commands.insert(role, command.into());
        self
    }

    /// Profile name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Compiler family.
    pub fn family(&self) -> ToolchainFamily {
        self.family
    }

    /// Default command for a role.
    pub fn command(&self, role: Role) -> Option<&str> {
        self.commands.get(&role).map(String::as_str)
    }

    /// Default option template for a role.
    pub fn template(&self, role: Role) -> Option<&OptionTemplate> {
        self.templates.get(&role)
    }

    /// Flag conventions.
    pub fn conventions(&self) -> &FlagConventions {
        &self.conventions
    }

    /// Static library file name for a target.
    pub fn static_lib_filename(&self, name: &str) -> String {
        format!(
            "{}{}.{}",
            self.conventions.static_lib_prefix, name, self.conventions.static_lib_extension
        )
    }

    /// Executable file name for a binary.
    pub fn exe_filename(&self, name: &str) -> String {
        if self.conventions.exe_extension.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", name, self.conventions.exe_extension)
        }
    }
}

impl fmt::Display for ToolchainProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.family.as_str())
    }
}

/// A command to execute, with program and arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    /// The program to run (e.g., "gcc", "cl.exe")
    pub program: String,
    /// Command arguments
    pub args: Vec<String>,
}

impl CommandSpec {
    /// Create a new command spec.
    pub fn new(program: impl Into<String>) -> Self {
        CommandSpec {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Add an argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments.
    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(|a| a.into()));
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}
