use std::env;
use std::process::Command;

fn main() {
    // Tell the linker where to find the libraries
    #[cfg(windows)]
    {
        println!("cargo:rustc-link-lib=dylib=openblas");
        println!("cargo:rustc-link-lib=dylib=lapack");
    }

    // Only the Python bindings need libpython, and only when linking test binaries
    // (the extension module itself is loaded by the interpreter)
    if env::var("CARGO_FEATURE_PYTHON").is_err() {
        return;
    }
    let profile: String = env::var("PROFILE").unwrap_or_default();
    if profile != "test" && profile != "debug" {
        return;
    }

    // Try Python from PYO3_PYTHON env var first, then VIRTUAL_ENV, then python3
    let python_cmd: String = if let Ok(pyo3_python) = env::var("PYO3_PYTHON") {
        pyo3_python
    } else if let Ok(venv) = env::var("VIRTUAL_ENV") {
        format!("{}/bin/python", venv)
    } else {
        "python3".to_string()
    };

    let libdir_output = Command::new(&python_cmd)
        .args(["-c", "import sysconfig; print(sysconfig.get_config_var('LIBDIR'))"])
        .output();
    let version_output = Command::new(&python_cmd)
        .args(["-c", "import sys; print(f'{sys.version_info.major}.{sys.version_info.minor}')"])
        .output();

    if let (Ok(libdir_output), Ok(version_output)) = (libdir_output, version_output) {
        if libdir_output.status.success() && version_output.status.success() {
            let libdir: String = String::from_utf8_lossy(&libdir_output.stdout).trim().to_string();
            let version: String = String::from_utf8_lossy(&version_output.stdout).trim().to_string();
            println!("cargo:rustc-link-search=native={}", libdir);
            println!("cargo:rustc-link-lib=dylib=python{}", version);
        }
    }
}
