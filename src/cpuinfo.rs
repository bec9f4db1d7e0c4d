//! CPU brand-string discovery, printed once at startup. Replaces the
//! original C client's direct `cpuid` extraction with the portable
//! `sysinfo` equivalent.

use sysinfo::System;

/// Return the brand string of the first detected CPU (e.g. "AMD Ryzen 9
/// 7950X 16-Core Processor"), or an empty string if none could be read.
pub fn brand_string() -> String {
    let sys = System::new_all();
    sys.cpus()
        .first()
        .map(|cpu| cpu.brand().trim().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brand_string_does_not_panic() {
        let _ = brand_string();
    }
}
