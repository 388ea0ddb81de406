//! Execution-location probe
//!
//! The AST2400/AST2500 run an ARM11 core; finding that architecture under
//! us means the tool runs on the BMC itself rather than on its host.

use crate::error::Result;

/// `uname` machine string of the AST ARM core
pub const AST_MACHINE: &str = "armv6l";

/// True when `machine` names the AST's own CPU
pub fn is_ast_machine(machine: &str) -> bool {
    machine == AST_MACHINE
}

/// True when this process runs on the AST's CPU
#[cfg(any(target_os = "linux", target_os = "freebsd"))]
pub fn running_on_chip() -> Result<bool> {
    use crate::error::HwError;

    let uts = nix::sys::utsname::uname().map_err(|e| HwError::Uname(e.into()))?;
    let machine = uts.machine().to_string_lossy();
    log::debug!("Machine architecture: {}", machine);
    Ok(is_ast_machine(&machine))
}

/// True when this process runs on the AST's CPU
#[cfg(not(any(target_os = "linux", target_os = "freebsd")))]
pub fn running_on_chip() -> Result<bool> {
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_machine_match() {
        assert!(is_ast_machine("armv6l"));
        assert!(!is_ast_machine("armv7l"));
        assert!(!is_ast_machine("x86_64"));
    }

    #[test]
    fn test_probe_runs() {
        // Test hosts are never the BMC
        assert!(!running_on_chip().unwrap());
    }
}
