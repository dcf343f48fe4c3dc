//! List commands implementation

use updiprog_core::device::{lookup, PartCode};

/// List all supported parts
pub fn list_parts() {
    println!("Supported parts:");
    println!();
    println!(
        "{:<6} {:<18} {:>14} {:>14}",
        "Part", "Devices", "Flash", "EEPROM"
    );
    println!("{}", "-".repeat(56));

    for dev in PartCode::ALL.iter().map(|&p| lookup(p)) {
        println!(
            "{:<6} {:<18} {:>14} {:>14}",
            dev.part.name(),
            dev.description,
            format!("{} / {}", format_size(dev.flash.size), dev.flash.page_size),
            format!("{} / {}", format_size(dev.eeprom.size), dev.eeprom.page_size),
        );
    }
    println!();
    println!("Sizes are shown as total / page size.");
}

fn format_size(bytes: u32) -> String {
    if bytes >= 1024 {
        format!("{} KiB", bytes / 1024)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(48 * 1024), "48 KiB");
        assert_eq!(format_size(256), "256 B");
    }
}
