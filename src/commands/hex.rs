//! Offline Intel HEX utilities

use std::path::Path;

use updiprog_core::ihex::tools;

pub fn run_txt2hex(input: &Path, output: &Path) -> Result<(), Box<dyn std::error::Error>> {
    tools::txt2hex_file(input, output)?;
    println!("Converted {:?} to {:?}", input, output);
    Ok(())
}

pub fn run_hex2c(input: &Path, output: &Path) -> Result<(), Box<dyn std::error::Error>> {
    tools::hex2c_file(input, output)?;
    println!("Converted {:?} to C array {:?}", input, output);
    Ok(())
}

pub fn run_hex2bin(input: &Path, output: &Path) -> Result<(), Box<dyn std::error::Error>> {
    tools::hex2bin_file(input, output)?;
    println!("Converted {:?} to binary {:?}", input, output);
    Ok(())
}

pub fn run_merge(
    first: &Path,
    second: &Path,
    output: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    tools::merge_files(first, second, output)?;
    println!("Merged {:?} and {:?} into {:?}", first, second, output);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_hex2bin_command() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.hex");
        let output = dir.path().join("out.bin");
        fs::write(&input, ":0400100001020304E2\r\n:00000001FF\r\n").unwrap();

        run_hex2bin(&input, &output).unwrap();
        assert_eq!(fs::read(&output).unwrap(), [1, 2, 3, 4]);
    }

    #[test]
    fn test_merge_command_rejects_overlap() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.hex");
        let b = dir.path().join("b.hex");
        fs::write(&a, ":0400100001020304E2\r\n:00000001FF\r\n").unwrap();
        fs::write(&b, ":0400120005060708D0\r\n:00000001FF\r\n").unwrap();

        let out = dir.path().join("out.hex");
        assert!(run_merge(&a, &b, &out).is_err());
        assert!(!out.exists());
    }
}
