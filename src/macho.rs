use crate::{Error, RawSymbolRecord, Result};
use object::read::macho::{FatArch, FatHeader, MachHeader, Nlist};
use object::{macho, Endianness, FileKind};

/// Symbol table entries of a Mach-O image, in table order.
///
/// Universal binaries contribute the entries of every architecture slice,
/// one slice after the other.
#[derive(Debug, Default)]
pub struct Symbols<'data> {
    records: Vec<RawSymbolRecord<'data>>,
    images: usize,
}

impl<'data> Symbols<'data> {
    pub fn parse(data: &'data [u8]) -> Result<Self> {
        let mut this = Self::default();

        match FileKind::parse(data)? {
            FileKind::MachOFat32 => {
                for arch in FatHeader::parse_arch32(data)? {
                    this.parse_image(arch.data(data)?)?;
                }
            }
            FileKind::MachOFat64 => {
                for arch in FatHeader::parse_arch64(data)? {
                    this.parse_image(arch.data(data)?)?;
                }
            }
            _ => this.parse_image(data)?,
        }

        Ok(this)
    }

    fn parse_image(&mut self, data: &'data [u8]) -> Result<()> {
        match FileKind::parse(data)? {
            FileKind::MachO32 => self.parse_symtab::<macho::MachHeader32<Endianness>>(data),
            FileKind::MachO64 => self.parse_symtab::<macho::MachHeader64<Endianness>>(data),
            kind => Err(Error::UnsupportedFormat(kind)),
        }
    }

    fn parse_symtab<Mach: MachHeader>(&mut self, data: &'data [u8]) -> Result<()> {
        let header = Mach::parse(data, 0)?;
        let endian = header.endian()?;

        let mut load_cmds_iter = header.load_commands(endian, data, 0)?;
        while let Some(lcmd) = load_cmds_iter.next()? {
            let cmd = match lcmd.symtab()? {
                Some(cmd) => cmd,
                None => continue,
            };

            let symtab = cmd.symbols::<Mach, _>(endian, data)?;
            let strings = symtab.strings();

            for (idx, nlist) in symtab.iter().enumerate() {
                let name = match nlist.name(endian, strings) {
                    Ok(name) => name,
                    Err(err) => {
                        log::warning!("[macho::parse_symtab] Symbol {idx}: {err}.");
                        continue;
                    }
                };

                let name = match std::str::from_utf8(name) {
                    Ok(name) => name,
                    Err(..) => {
                        log::warning!("[macho::parse_symtab] Symbol {idx} isn't valid utf-8.");
                        continue;
                    }
                };

                self.records.push(RawSymbolRecord {
                    name,
                    type_code: nlist.n_type(),
                    address: nlist.n_value(endian).into(),
                });
            }
        }

        self.images += 1;
        Ok(())
    }

    pub fn records(&self) -> &[RawSymbolRecord<'data>] {
        &self.records
    }

    pub fn into_records(self) -> Vec<RawSymbolRecord<'data>> {
        self.records
    }

    /// Number of thin images the entries were read from.
    pub fn images(&self) -> usize {
        self.images
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod testdata {
    const MH_MAGIC_64: u32 = 0xfeedfacf;
    const MH_MAGIC: u32 = 0xfeedface;
    const FAT_MAGIC: u32 = 0xcafebabe;
    const FAT_MAGIC_64: u32 = 0xcafebabf;
    const LC_SYMTAB: u32 = 0x2;
    const MH_OBJECT: u32 = 0x1;

    fn u16le(out: &mut Vec<u8>, v: u16) {
        out.extend_from_slice(&v.to_le_bytes());
    }

    fn u32le(out: &mut Vec<u8>, v: u32) {
        out.extend_from_slice(&v.to_le_bytes());
    }

    fn u32be(out: &mut Vec<u8>, v: u32) {
        out.extend_from_slice(&v.to_be_bytes());
    }

    /// Little-endian object file with a single `LC_SYMTAB` load command.
    pub fn image(is_64: bool, symbols: &[(&[u8], u8, u64)]) -> Vec<u8> {
        let header_len = if is_64 { 32 } else { 28 };
        let nlist_len = if is_64 { 16 } else { 12 };
        let symoff = header_len + 24;
        let stroff = symoff + nlist_len * symbols.len();

        // string table starts with an empty name
        let mut strings = vec![0u8];
        let mut offsets = Vec::new();
        for (name, ..) in symbols {
            offsets.push(strings.len() as u32);
            strings.extend_from_slice(name);
            strings.push(0);
        }
        while strings.len() % 4 != 0 {
            strings.push(0);
        }

        let mut out = Vec::new();
        u32le(&mut out, if is_64 { MH_MAGIC_64 } else { MH_MAGIC });
        u32le(&mut out, if is_64 { 0x0100_0007 } else { 0x7 });
        u32le(&mut out, 0x3);
        u32le(&mut out, MH_OBJECT);
        u32le(&mut out, 1);
        u32le(&mut out, 24);
        u32le(&mut out, 0);
        if is_64 {
            u32le(&mut out, 0);
        }

        u32le(&mut out, LC_SYMTAB);
        u32le(&mut out, 24);
        u32le(&mut out, symoff as u32);
        u32le(&mut out, symbols.len() as u32);
        u32le(&mut out, stroff as u32);
        u32le(&mut out, strings.len() as u32);

        for ((_, type_code, value), strx) in symbols.iter().zip(offsets) {
            u32le(&mut out, strx);
            out.push(*type_code);
            out.push(1);
            u16le(&mut out, 0);
            if is_64 {
                out.extend_from_slice(&value.to_le_bytes());
            } else {
                u32le(&mut out, *value as u32);
            }
        }

        out.extend_from_slice(&strings);
        out
    }

    /// Universal binary wrapping `slices`, each aligned to 16 bytes.
    pub fn fat(is_64: bool, slices: &[Vec<u8>]) -> Vec<u8> {
        let align = |n: usize| (n + 15) & !15;
        let arch_len = if is_64 { 32 } else { 20 };
        let mut offset = align(8 + arch_len * slices.len());

        let mut out = Vec::new();
        u32be(&mut out, if is_64 { FAT_MAGIC_64 } else { FAT_MAGIC });
        u32be(&mut out, slices.len() as u32);
        for slice in slices {
            u32be(&mut out, 0x0100_0007);
            u32be(&mut out, 0x3);
            if is_64 {
                out.extend_from_slice(&(offset as u64).to_be_bytes());
                out.extend_from_slice(&(slice.len() as u64).to_be_bytes());
                u32be(&mut out, 4);
                u32be(&mut out, 0);
            } else {
                u32be(&mut out, offset as u32);
                u32be(&mut out, slice.len() as u32);
                u32be(&mut out, 4);
            }
            offset = align(offset + slice.len());
        }

        for slice in slices {
            out.resize(align(out.len()), 0);
            out.extend_from_slice(slice);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::testdata::{fat, image};
    use super::*;

    #[test]
    fn reads_thin_64_bit_images() {
        let data = image(
            true,
            &[
                (b"_Z3fooi", 0x0f, 0x1000),
                (b"_ZSt4cout:G", 0x20, 0),
                (b"_main", 0x0f, 0x2000),
            ],
        );
        let symbols = Symbols::parse(&data).unwrap();

        assert_eq!(symbols.images(), 1);
        assert_eq!(
            symbols.records(),
            &[
                RawSymbolRecord { name: "_Z3fooi", type_code: 0x0f, address: 0x1000 },
                RawSymbolRecord { name: "_ZSt4cout:G", type_code: 0x20, address: 0 },
                RawSymbolRecord { name: "_main", type_code: 0x0f, address: 0x2000 },
            ]
        );
    }

    #[test]
    fn reads_thin_32_bit_images() {
        let data = image(false, &[(b"_Z1fv", 0x0e, 0x40)]);
        let symbols = Symbols::parse(&data).unwrap();

        assert_eq!(
            symbols.into_records(),
            vec![RawSymbolRecord { name: "_Z1fv", type_code: 0x0e, address: 0x40 }]
        );
    }

    #[test]
    fn reads_every_slice_of_a_universal_binary() {
        let data = fat(
            false,
            &[
                image(true, &[(b"_Z1av", 0x0f, 0x10)]),
                image(false, &[(b"_Z1bv", 0x0f, 0x20), (b"_start", 0x01, 0)]),
            ],
        );
        let symbols = Symbols::parse(&data).unwrap();

        assert_eq!(symbols.images(), 2);
        let names: Vec<&str> = symbols.records().iter().map(|r| r.name).collect();
        assert_eq!(names, ["_Z1av", "_Z1bv", "_start"]);
    }

    #[test]
    fn reads_64_bit_universal_headers() {
        let data = fat(
            true,
            &[
                image(true, &[(b"_Z1cv", 0x0f, 0x30)]),
                image(true, &[(b"_Z1dv", 0x0e, 0x40)]),
            ],
        );
        let symbols = Symbols::parse(&data).unwrap();

        assert_eq!(symbols.images(), 2);
        assert_eq!(
            symbols.records(),
            &[
                RawSymbolRecord { name: "_Z1cv", type_code: 0x0f, address: 0x30 },
                RawSymbolRecord { name: "_Z1dv", type_code: 0x0e, address: 0x40 },
            ]
        );
    }

    #[test]
    fn truncated_universal_header_is_an_error() {
        let mut data = fat(false, &[image(true, &[(b"_Z1av", 0x0f, 0x10)])]);
        data.truncate(20);

        assert!(matches!(Symbols::parse(&data), Err(Error::Object(_))));
    }

    #[test]
    fn skips_names_that_arent_utf8() {
        let data = image(true, &[(b"\xff\xfe", 0x0f, 0), (b"_Z1fv", 0x0f, 0)]);
        let symbols = Symbols::parse(&data).unwrap();

        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols.records()[0].name, "_Z1fv");
    }

    #[test]
    fn rejects_other_formats() {
        let mut elf = vec![0x7f, b'E', b'L', b'F', 2, 1, 1, 0];
        elf.resize(64, 0);

        assert!(matches!(Symbols::parse(&elf), Err(Error::UnsupportedFormat(_))));
        assert!(matches!(Symbols::parse(b"garbage"), Err(Error::Object(_))));
    }

    #[test]
    fn truncated_symbol_table_is_an_error() {
        let mut data = image(true, &[(b"_Z3fooi", 0x0f, 0x1000)]);
        data.truncate(60);

        assert!(matches!(Symbols::parse(&data), Err(Error::Object(_))));
    }
}
