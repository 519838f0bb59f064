//! Switch identity: datapath id derivation and the process-wide description
//! strings reported by desc stats, with an optional platform-identity
//! override.

/// 48-bit MAC of the local interface in the low bits of a 64-bit id.
pub fn datapath_id(hw_addr: [u8; 6]) -> u64 {
    hw_addr
        .iter()
        .fold(0u64, |id, &byte| (id << 8) | u64::from(byte))
}

/// Vendor OUI that gates the platform-identity override, as the hex digits
/// found in the node field of a version-1 product UUID.
const IDENTITY_OUI: &str = "002320";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Descriptions {
    pub mfr_desc: String,
    pub hw_desc: String,
    pub sw_desc: String,
    pub serial_num: String,
}

impl Default for Descriptions {
    fn default() -> Self {
        Self {
            mfr_desc: "Open Switch Project".to_string(),
            hw_desc: "Reference Userspace Switch".to_string(),
            sw_desc: env!("CARGO_PKG_VERSION").to_string(),
            serial_num: "None".to_string(),
        }
    }
}

/// Identity strings probed from the platform (DMI or equivalent).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PlatformIdentity {
    pub sys_vendor: Option<String>,
    pub product_name: Option<String>,
    pub product_version: Option<String>,
    pub product_serial: Option<String>,
    pub product_uuid: Option<String>,
}

impl Descriptions {
    /// Adopt platform identity when the product UUID is a version-1 UUID
    /// whose node field carries the expected vendor OUI.
    pub fn apply_platform_identity(&mut self, ident: &PlatformIdentity) {
        let Some(uuid) = ident.product_uuid.as_deref() else {
            return;
        };
        if uuid.len() != 36 || uuid.as_bytes()[14] != b'1' {
            return;
        }
        if !uuid[24..].starts_with(IDENTITY_OUI) {
            return;
        }

        if let Some(vendor) = &ident.sys_vendor {
            self.mfr_desc = vendor.clone();
        }
        if ident.product_name.is_some() || ident.product_version.is_some() {
            self.hw_desc = format!(
                "{} {}",
                ident.product_name.as_deref().unwrap_or(""),
                ident.product_version.as_deref().unwrap_or("")
            );
        }
        if let Some(serial) = &ident.product_serial {
            self.serial_num = serial.clone();
        }
    }
}
