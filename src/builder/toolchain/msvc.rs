//! MSVC toolchain profile.

use crate::core::settings::Role;

use super::{FlagConventions, ToolchainFamily, ToolchainProfile};

/// Build the Visual C++ profile (Windows).
pub(super) fn profile() -> ToolchainProfile {
    ToolchainProfile::from_parts(
        "msvc",
        ToolchainFamily::Msvc,
        &[
            // cl.exe handles C, C++ and the Objective-C slot alike
            (Role::CompileC, "cl.exe"),
            (Role::CompileCxx, "cl.exe"),
            (Role::CompileObjc, "cl.exe"),
            (Role::Assemble, "ml64.exe"),
            (Role::Link, "link.exe"),
            (Role::Archive, "lib.exe"),
        ],
        &[
            (Role::CompileC, "/nologo %{flags} /Fo%{outfile} /c %{infile}"),
            (Role::CompileCxx, "/nologo /TP %{flags} /Fo%{outfile} /c %{infile}"),
            (Role::CompileObjc, "/nologo %{flags} /Fo%{outfile} /c %{infile}"),
            (Role::Assemble, "/nologo %{flags} /Fo%{outfile} /c %{infile}"),
            (
                Role::Link,
                "/NOLOGO %{flags} /OUT:%{outfile} %{objs} %{flags_before_libraries} %{libs} %{flags_after_libraries}",
            ),
            (Role::Archive, "/NOLOGO /OUT:%{outfile} %{objs}"),
        ],
        FlagConventions {
            include_prefix: "/I".to_string(),
            define_prefix: "/D".to_string(),
            library_prefix: String::new(),
            library_suffix: ".lib".to_string(),
            library_path_prefix: "/LIBPATH:".to_string(),
            debug_flags: vec!["/Zi".to_string(), "/Od".to_string()],
            no_exceptions_flag: "/EHs-c-".to_string(),
            exception_runtime: Vec::new(),
            static_lib_prefix: String::new(),
            static_lib_extension: "lib".to_string(),
            exe_extension: "exe".to_string(),
        },
    )
}
