use anyhow::{anyhow, Result};

/// Find a device index by index string or case-insensitive name substring
pub fn find_device(devices: &[String], search: &str, kind: &str) -> Result<usize> {
    // Try to parse as index first
    if let Ok(index) = search.parse::<usize>() {
        if index < devices.len() {
            return Ok(index);
        }
        return Err(anyhow!(
            "{} device index {} out of range ({} available)",
            kind,
            index,
            devices.len()
        ));
    }

    let search_lower = search.to_lowercase();
    devices
        .iter()
        .position(|device| device.to_lowercase().contains(&search_lower))
        .ok_or_else(|| anyhow!("{} device '{}' not found", kind, search))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn devices() -> Vec<String> {
        vec!["Built-in Microphone".to_string(), "USB Audio Interface".to_string()]
    }

    #[test]
    fn test_find_by_index() {
        assert_eq!(find_device(&devices(), "1", "Audio").unwrap(), 1);
        assert!(find_device(&devices(), "5", "Audio").is_err());
    }

    #[test]
    fn test_find_by_name_substring() {
        assert_eq!(find_device(&devices(), "usb", "Audio").unwrap(), 1);
        assert_eq!(find_device(&devices(), "MICRO", "Audio").unwrap(), 0);
        assert!(find_device(&devices(), "loopback", "Audio").is_err());
    }
}
