//! Per-role tool settings.
//!
//! Each Target owns one [`Settings`] value per tool [`Role`]. Settings are
//! plain values: deriving one role from another copies it, so later edits
//! to either side never leak into the other.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::template::OptionTemplate;

/// The tool a [`Settings`] object configures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    /// C compiler
    #[serde(alias = "cc")]
    CompileC,
    /// C++ compiler
    #[serde(alias = "cxx", alias = "c++")]
    CompileCxx,
    /// Objective-C compiler
    #[serde(alias = "objc")]
    CompileObjc,
    /// Assembler
    #[serde(alias = "asm")]
    Assemble,
    /// Linker
    #[serde(alias = "linker")]
    Link,
    /// Static library archiver
    #[serde(alias = "archiver", alias = "ar")]
    Archive,
}

impl Role {
    /// Roles present on every target from registration.
    pub const STANDARD: [Role; 4] = [Role::CompileC, Role::CompileCxx, Role::Link, Role::Archive];

    /// Every known role.
    pub const ALL: [Role; 6] = [
        Role::CompileC,
        Role::CompileCxx,
        Role::CompileObjc,
        Role::Assemble,
        Role::Link,
        Role::Archive,
    ];

    /// Get the role name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::CompileC => "compile-c",
            Role::CompileCxx => "compile-cxx",
            Role::CompileObjc => "compile-objc",
            Role::Assemble => "assemble",
            Role::Link => "link",
            Role::Archive => "archive",
        }
    }

    /// Whether this role turns sources into objects.
    pub fn is_compile(&self) -> bool {
        matches!(
            self,
            Role::CompileC | Role::CompileCxx | Role::CompileObjc | Role::Assemble
        )
    }

    /// Placeholders an option template for this role may reference.
    pub fn placeholders(&self) -> &'static [&'static str] {
        match self {
            Role::CompileC | Role::CompileCxx | Role::CompileObjc | Role::Assemble => {
                &["flags", "outfile", "infile"]
            }
            Role::Archive => &["outfile", "objs"],
            Role::Link => &[
                "flags",
                "outfile",
                "objs",
                "libs",
                "flags_before_libraries",
                "flags_after_libraries",
            ],
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "compile-c" | "cc" => Ok(Role::CompileC),
            "compile-cxx" | "cxx" | "c++" => Ok(Role::CompileCxx),
            "compile-objc" | "objc" => Ok(Role::CompileObjc),
            "assemble" | "asm" => Ok(Role::Assemble),
            "link" | "linker" => Ok(Role::Link),
            "archive" | "archiver" | "ar" => Ok(Role::Archive),
            _ => Err(RoleParseError(s.to_string())),
        }
    }
}

/// Error returned when parsing an unknown role name.
#[derive(Debug, Clone)]
pub struct RoleParseError(pub String);

impl fmt::Display for RoleParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown tool role '{}', valid values: cc, cxx, objc, asm, linker, archiver",
            self.0
        )
    }
}

impl std::error::Error for RoleParseError {}

/// Parameters for one tool role.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Executable to run; unset means "take the toolchain default"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    command: Option<String>,

    /// Flag tokens in the order they were added
    #[serde(default)]
    flags: Vec<String>,

    /// Include search paths
    #[serde(default)]
    include_paths: Vec<String>,

    /// Preprocessor defines (no duplicates)
    #[serde(default)]
    defines: Vec<String>,

    /// Option template; unset means "take the toolchain default"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    option_template: Option<OptionTemplate>,

    /// Libraries to link (without prefix)
    #[serde(default)]
    libraries: Vec<String>,

    /// Library search paths
    #[serde(default)]
    library_paths: Vec<String>,

    /// Role this settings object was copied from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    derived_from: Option<Role>,
}

impl Settings {
    /// Create empty settings.
    pub fn new() -> Self {
        Settings::default()
    }

    /// Deep copy of every field. The copy and the source are independent.
    pub fn derive(&self) -> Settings {
        self.clone()
    }

    pub(crate) fn mark_derived_from(&mut self, role: Role) {
        self.derived_from = Some(role);
    }

    /// Role this object was derived from, if any.
    pub fn derived_from(&self) -> Option<Role> {
        self.derived_from
    }

    /// Get the command, if set.
    pub fn command(&self) -> Option<&str> {
        self.command.as_deref()
    }

    /// Set the command.
    pub fn set_command(&mut self, command: impl Into<String>) -> &mut Self {
        self.command = Some(command.into());
        self
    }

    /// Get the flag tokens.
    pub fn flags(&self) -> &[String] {
        &self.flags
    }

    /// Append flag tokens after the existing ones.
    pub fn append_flags(&mut self, flags: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.flags.extend(flags.into_iter().map(Into::into));
        self
    }

    /// Append a whitespace-separated flag string, e.g. `"-Wall -g"`.
    pub fn append_flag_str(&mut self, flags: &str) -> &mut Self {
        self.append_flags(flags.split_whitespace())
    }

    /// Replace the whole flag sequence, discarding inherited flags.
    pub fn replace_flags(&mut self, flags: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.flags = flags.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the flag sequence from a whitespace-separated string.
    pub fn replace_flag_str(&mut self, flags: &str) -> &mut Self {
        self.replace_flags(flags.split_whitespace())
    }

    /// Get the include paths.
    pub fn include_paths(&self) -> &[String] {
        &self.include_paths
    }

    /// Append include paths.
    pub fn add_include_paths(
        &mut self,
        paths: impl IntoIterator<Item = impl Into<String>>,
    ) -> &mut Self {
        self.include_paths.extend(paths.into_iter().map(Into::into));
        self
    }

    /// Get the defines.
    pub fn defines(&self) -> &[String] {
        &self.defines
    }

    /// Add defines. A define that is already present is not added again.
    pub fn add_defines(&mut self, defines: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        for define in defines {
            let define = define.into();
            if !self.defines.contains(&define) {
                self.defines.push(define);
            }
        }
        self
    }

    /// Get the option template, if set.
    pub fn option_template(&self) -> Option<&OptionTemplate> {
        self.option_template.as_ref()
    }

    /// Set the option template.
    pub fn set_option_template(&mut self, template: impl Into<OptionTemplate>) -> &mut Self {
        self.option_template = Some(template.into());
        self
    }

    /// Get the libraries.
    pub fn libraries(&self) -> &[String] {
        &self.libraries
    }

    /// Append libraries.
    pub fn add_libraries(&mut self, libs: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.libraries.extend(libs.into_iter().map(Into::into));
        self
    }

    pub(crate) fn remove_libraries(&mut self, libs: &[String]) {
        self.libraries.retain(|lib| !libs.contains(lib));
    }

    /// Get the library search paths.
    pub fn library_paths(&self) -> &[String] {
        &self.library_paths
    }

    /// Append library search paths.
    pub fn add_library_paths(
        &mut self,
        paths: impl IntoIterator<Item = impl Into<String>>,
    ) -> &mut Self {
        self.library_paths.extend(paths.into_iter().map(Into::into));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Settings {
        let mut s = Settings::new();
        s.set_command("rx-elf-gcc")
            .append_flag_str("-Wall -g -Os")
            .add_include_paths(["include"])
            .add_defines(["GRSAKURA"]);
        s
    }

    #[test]
    fn test_derive_is_isolated_from_source() {
        let mut source = base();
        let derived = source.derive();

        source.append_flags(["-flto"]);
        source.add_include_paths(["extra"]);
        source.set_command("other-gcc");

        assert_eq!(derived.flags(), &["-Wall", "-g", "-Os"]);
        assert_eq!(derived.include_paths(), &["include"]);
        assert_eq!(derived.command(), Some("rx-elf-gcc"));
    }

    #[test]
    fn test_source_is_isolated_from_derived() {
        let source = base();
        let mut derived = source.derive();

        derived.append_flags(["-fno-rtti"]);
        derived.add_defines(["CXX_ONLY"]);

        assert_eq!(source.flags(), &["-Wall", "-g", "-Os"]);
        assert_eq!(source.defines(), &["GRSAKURA"]);
    }

    #[test]
    fn test_append_preserves_order_and_duplicates() {
        let mut s = Settings::new();
        s.append_flags(["-O2", "-g"]).append_flags(["-O0", "-g"]);
        assert_eq!(s.flags(), &["-O2", "-g", "-O0", "-g"]);
    }

    #[test]
    fn test_replace_discards_previous_flags() {
        let mut s = base();
        s.replace_flag_str("-DARDUINO=100");
        assert_eq!(s.flags(), &["-DARDUINO=100"]);
    }

    #[test]
    fn test_defines_have_set_semantics() {
        let mut s = Settings::new();
        s.add_defines(["A", "B"]).add_defines(["A", "C"]);
        assert_eq!(s.defines(), &["A", "B", "C"]);
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("cxx".parse::<Role>().unwrap(), Role::CompileCxx);
        assert_eq!("archiver".parse::<Role>().unwrap(), Role::Archive);
        assert!("fortran".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_placeholders() {
        assert!(Role::Archive.placeholders().contains(&"objs"));
        assert!(!Role::Archive.placeholders().contains(&"infile"));
        assert!(Role::CompileCxx.placeholders().contains(&"infile"));
    }
}
