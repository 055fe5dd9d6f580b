//! CRC-32 校验（ZIP / ISO-3309 标准）
//!
//! 反射多项式 0xEDB88320，256 项查表，初始值全 1，结果取反。

const POLYNOMIAL: u32 = 0xEDB8_8320;

/// 编译期生成的查找表
static TABLE: [u32; 256] = build_table();

const fn build_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut n = 0;
    while n < 256 {
        let mut c = n as u32;
        let mut k = 0;
        while k < 8 {
            c = if c & 1 != 0 {
                POLYNOMIAL ^ (c >> 1)
            } else {
                c >> 1
            };
            k += 1;
        }
        table[n] = c;
        n += 1;
    }
    table
}

/// 增量 CRC-32 计算器
#[derive(Debug, Clone, Copy)]
pub struct Crc32 {
    state: u32,
}

impl Crc32 {
    pub fn new() -> Self {
        Self { state: u32::MAX }
    }

    /// 追加一段数据
    pub fn update(&mut self, data: &[u8]) {
        let mut crc = self.state;
        for &byte in data {
            crc = (crc >> 8) ^ TABLE[((crc ^ byte as u32) & 0xFF) as usize];
        }
        self.state = crc;
    }

    /// 返回最终校验值（不消耗状态，可继续 update）
    pub fn finish(&self) -> u32 {
        self.state ^ u32::MAX
    }
}

impl Default for Crc32 {
    fn default() -> Self {
        Self::new()
    }
}

/// 一次性计算整段数据的 CRC-32
pub fn crc32(data: &[u8]) -> u32 {
    let mut hasher = Crc32::new();
    hasher.update(data);
    hasher.finish()
}
