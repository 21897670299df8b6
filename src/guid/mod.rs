use std::fmt::{Display, Formatter};

// GUIDs are stored on disk with little-endian Data1/Data2/Data3 and the
// Data4 bytes in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Guid {
    pub data1: u32,
    pub data2: u16,
    pub data3: u16,
    pub data4: [u8; 8],
}

lazy_static! {
    // {7FC28940-9D31-11D0-9B27-00A0C91E9C7C}
    pub static ref CHM_LZX_GUID: Guid = Guid {
        data1: 0x7FC2_8940,
        data2: 0x9D31,
        data3: 0x11D0,
        data4: [0x9B, 0x27, 0x00, 0xA0, 0xC9, 0x1E, 0x9C, 0x7C],
    };

    // {0A9007C6-4076-11D3-8789-0000F8105754}
    pub static ref HELP2_LZX_GUID: Guid = Guid {
        data1: 0x0A90_07C6,
        data2: 0x4076,
        data3: 0x11D3,
        data4: [0x87, 0x89, 0x00, 0x00, 0xF8, 0x10, 0x57, 0x54],
    };

    // {67F6E4A2-60BF-11D3-8540-00C04F58C3CF}
    pub static ref DES_GUID: Guid = Guid {
        data1: 0x67F6_E4A2,
        data2: 0x60BF,
        data3: 0x11D3,
        data4: [0x85, 0x40, 0x00, 0xC0, 0x4F, 0x58, 0xC3, 0xCF],
    };
}

impl Guid {
    pub fn is_lzx(&self) -> bool {
        *self == *CHM_LZX_GUID || *self == *HELP2_LZX_GUID
    }

    pub fn is_des(&self) -> bool {
        *self == *DES_GUID
    }
}

// Registry format, uppercase. The rendering is load-bearing: the per-method
// reset table is stored under an item name that embeds this exact string.
impl Display for Guid {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{{:08X}-{:04X}-{:04X}-{:02X}{:02X}-{:02X}{:02X}{:02X}{:02X}{:02X}{:02X}}}",
            self.data1,
            self.data2,
            self.data3,
            self.data4[0],
            self.data4[1],
            self.data4[2],
            self.data4[3],
            self.data4[4],
            self.data4[5],
            self.data4[6],
            self.data4[7],
        )
    }
}
