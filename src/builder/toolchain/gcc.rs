//! GCC/Clang toolchain profiles.

use crate::core::settings::Role;

use super::{FlagConventions, ToolchainFamily, ToolchainProfile};

const COMPILE_TEMPLATE: &str = "%{flags} -o %{outfile} -c %{infile}";
const LINK_TEMPLATE: &str =
    "%{flags} -o %{outfile} %{objs} %{flags_before_libraries} %{libs} %{flags_after_libraries}";
const ARCHIVE_TEMPLATE: &str = "rs %{outfile} %{objs}";

/// Build a GCC-style profile (Unix-like systems).
pub(super) fn profile(name: &str, family: ToolchainFamily) -> ToolchainProfile {
    let (cc, cxx) = match family {
        ToolchainFamily::Clang => ("clang", "clang++"),
        _ => ("gcc", "g++"),
    };

    ToolchainProfile::from_parts(
        name,
        family,
        &[
            (Role::CompileC, cc),
            (Role::CompileCxx, cxx),
            (Role::CompileObjc, cc),
            (Role::Assemble, cc),
            // The C driver pulls in the right startup objects and libgcc
            (Role::Link, cc),
            (Role::Archive, "ar"),
        ],
        &[
            (Role::CompileC, COMPILE_TEMPLATE),
            (Role::CompileCxx, COMPILE_TEMPLATE),
            (Role::CompileObjc, COMPILE_TEMPLATE),
            (Role::Assemble, COMPILE_TEMPLATE),
            (Role::Link, LINK_TEMPLATE),
            (Role::Archive, ARCHIVE_TEMPLATE),
        ],
        FlagConventions {
            include_prefix: "-I".to_string(),
            define_prefix: "-D".to_string(),
            library_prefix: "-l".to_string(),
            library_suffix: String::new(),
            library_path_prefix: "-L".to_string(),
            debug_flags: vec!["-g3".to_string(), "-O0".to_string()],
            no_exceptions_flag: "-fno-exceptions".to_string(),
            exception_runtime: vec!["gcc_eh".to_string(), "supc++".to_string()],
            static_lib_prefix: "lib".to_string(),
            static_lib_extension: "a".to_string(),
            exe_extension: String::new(),
        },
    )
}
