//! ゲスト物理メモリ

use crate::Result;
use sdb_expr::Word;
use thiserror::Error;
use tracing::debug;

/// 物理メモリの既定ベースアドレス
pub const DEFAULT_MEM_BASE: Word = 0x8000_0000;

/// 物理メモリの既定サイズ（128 MiB）
pub const DEFAULT_MEM_SIZE: usize = 0x800_0000;

/// メモリアクセスのエラー
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    #[error("address = 0x{addr:x} (len {len}) is out of bound of pmem [0x{base:x}, 0x{end:x})")]
    OutOfBound {
        addr: Word,
        len: usize,
        base: Word,
        end: Word,
    },

    #[error("image of {image} bytes does not fit in {size} bytes of pmem")]
    ImageTooLarge { image: usize, size: usize },
}

/// メモリから読み書き可能な型（リトルエンディアン）
pub trait MemoryReadable: Sized {
    /// 型のサイズ（バイト数）
    const SIZE: usize;

    /// バイト列から値を構築
    fn from_le_slice(bytes: &[u8]) -> Self;

    /// バイト列に変換
    fn to_le_vec(&self) -> Vec<u8>;
}

macro_rules! impl_memory_readable {
    ($($ty:ty),*) => {
        $(
            impl MemoryReadable for $ty {
                const SIZE: usize = std::mem::size_of::<$ty>();

                fn from_le_slice(bytes: &[u8]) -> Self {
                    let mut array = [0u8; std::mem::size_of::<$ty>()];
                    array.copy_from_slice(&bytes[..Self::SIZE]);
                    <$ty>::from_le_bytes(array)
                }

                fn to_le_vec(&self) -> Vec<u8> {
                    self.to_le_bytes().to_vec()
                }
            }
        )*
    };
}

impl_memory_readable!(u8, u16, u32, u64);

/// ゲスト物理メモリ
///
/// `[base, base + size)` の範囲だけがアクセス可能です。
pub struct Memory {
    base: Word,
    data: Vec<u8>,
}

impl Memory {
    /// 0で初期化されたメモリを作成する
    pub fn new(base: Word, size: usize) -> Self {
        Self {
            base,
            data: vec![0; size],
        }
    }

    /// ベースアドレスを取得する
    pub fn base(&self) -> Word {
        self.base
    }

    /// メモリサイズを取得する
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// 終端アドレス（排他的）を取得する
    pub fn end(&self) -> Word {
        self.base.wrapping_add(self.data.len() as Word)
    }

    /// `[addr, addr + len)` がメモリ内にあるか
    pub fn in_bounds(&self, addr: Word, len: usize) -> bool {
        self.offset(addr, len).is_ok()
    }

    /// アドレスをバッファ内オフセットに変換する
    fn offset(&self, addr: Word, len: usize) -> std::result::Result<usize, MemoryError> {
        let out_of_bound = || MemoryError::OutOfBound {
            addr,
            len,
            base: self.base,
            end: self.end(),
        };

        let offset = addr
            .checked_sub(self.base)
            .and_then(|off| usize::try_from(off).ok())
            .ok_or_else(out_of_bound)?;

        match offset.checked_add(len) {
            Some(last) if last <= self.data.len() => Ok(offset),
            _ => Err(out_of_bound()),
        }
    }

    /// メモリからデータを読み取る
    pub fn read(&self, addr: Word, size: usize) -> Result<Vec<u8>> {
        let offset = self.offset(addr, size)?;
        Ok(self.data[offset..offset + size].to_vec())
    }

    /// メモリにデータを書き込む
    pub fn write(&mut self, addr: Word, data: &[u8]) -> Result<()> {
        let offset = self.offset(addr, data.len())?;
        self.data[offset..offset + data.len()].copy_from_slice(data);
        Ok(())
    }

    /// 型付き値を読み取る
    ///
    /// # Examples
    /// ```
    /// use sdb_target::Memory;
    ///
    /// let mut memory = Memory::new(0x1000, 0x100);
    /// memory.write_u32(0x1010, 0xdeadbeef).unwrap();
    /// assert_eq!(memory.read_typed::<u16>(0x1010).unwrap(), 0xbeef);
    /// ```
    pub fn read_typed<T: MemoryReadable>(&self, addr: Word) -> Result<T> {
        let offset = self.offset(addr, T::SIZE)?;
        Ok(T::from_le_slice(&self.data[offset..]))
    }

    /// 型付き値を書き込む
    pub fn write_typed<T: MemoryReadable>(&mut self, addr: Word, value: &T) -> Result<()> {
        self.write(addr, &value.to_le_vec())
    }

    pub fn read_u8(&self, addr: Word) -> Result<u8> {
        self.read_typed(addr)
    }

    pub fn read_u16(&self, addr: Word) -> Result<u16> {
        self.read_typed(addr)
    }

    pub fn read_u32(&self, addr: Word) -> Result<u32> {
        self.read_typed(addr)
    }

    pub fn read_u64(&self, addr: Word) -> Result<u64> {
        self.read_typed(addr)
    }

    pub fn write_u8(&mut self, addr: Word, value: u8) -> Result<()> {
        self.write_typed(addr, &value)
    }

    pub fn write_u16(&mut self, addr: Word, value: u16) -> Result<()> {
        self.write_typed(addr, &value)
    }

    pub fn write_u32(&mut self, addr: Word, value: u32) -> Result<()> {
        self.write_typed(addr, &value)
    }

    pub fn write_u64(&mut self, addr: Word, value: u64) -> Result<()> {
        self.write_typed(addr, &value)
    }

    /// イメージをベースアドレスから配置する
    pub fn load_image(&mut self, image: &[u8]) -> Result<()> {
        if image.len() > self.data.len() {
            return Err(MemoryError::ImageTooLarge {
                image: image.len(),
                size: self.data.len(),
            }
            .into());
        }
        self.data[..image.len()].copy_from_slice(image);
        debug!("loaded {} bytes at 0x{:x}", image.len(), self.base);
        Ok(())
    }
}

impl sdb_expr::MemoryReader for Memory {
    fn read_u8(&self, addr: Word) -> Result<u8> {
        Memory::read_u8(self, addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdb_expr::MemoryReader;

    #[test]
    fn test_read_write_little_endian() {
        let mut memory = Memory::new(0x8000_0000, 0x100);
        memory.write_u64(0x8000_0000, 0x1122_3344_5566_7788).unwrap();

        assert_eq!(memory.read_u8(0x8000_0000).unwrap(), 0x88);
        assert_eq!(memory.read_u16(0x8000_0000).unwrap(), 0x7788);
        assert_eq!(memory.read_u32(0x8000_0004).unwrap(), 0x1122_3344);
        assert_eq!(memory.read_u64(0x8000_0000).unwrap(), 0x1122_3344_5566_7788);
        assert_eq!(memory.read(0x8000_0006, 2).unwrap(), vec![0x22, 0x11]);
    }

    #[test]
    fn test_out_of_bound() {
        let mut memory = Memory::new(0x1000, 0x10);

        assert!(memory.in_bounds(0x1000, 0x10));
        assert!(!memory.in_bounds(0x1000, 0x11));
        assert!(!memory.in_bounds(0xfff, 1));
        assert!(!memory.in_bounds(Word::MAX, 2));

        let err = memory.read_u32(0x100e).unwrap_err();
        assert_eq!(
            err.downcast_ref::<MemoryError>(),
            Some(&MemoryError::OutOfBound {
                addr: 0x100e,
                len: 4,
                base: 0x1000,
                end: 0x1010,
            })
        );
        assert!(memory.write_u8(0x1010, 1).is_err());
        assert!(memory.write_u8(0x100f, 1).is_ok());
    }

    #[test]
    fn test_load_image() {
        let mut memory = Memory::new(0x1000, 4);
        memory.load_image(&[1, 2, 3]).unwrap();
        assert_eq!(memory.read(0x1000, 4).unwrap(), vec![1, 2, 3, 0]);

        let err = memory.load_image(&[0; 5]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MemoryError>(),
            Some(MemoryError::ImageTooLarge { image: 5, size: 4 })
        ));
    }

    #[test]
    fn test_memory_reader() {
        let mut memory = Memory::new(0x100, 0x10);
        memory.write_u8(0x100, 42).unwrap();
        let reader: &dyn MemoryReader = &memory;
        assert_eq!(reader.read_u8(0x100).unwrap(), 42);
        assert!(reader.read_u8(0x200).is_err());
    }
}
