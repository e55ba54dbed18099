use std::collections::HashMap;
use crate::codec::FormatParams;
use crate::core::error::{Error, Result};
use crate::store::data_input::IndexInput;
use crate::store::data_output::IndexOutput;
use crate::store::directory::Directory;

pub const FIELD_INFOS_CODEC: &str = "FieldInfos";

const IS_INDEXED: u8 = 0x1;
const STORE_PAYLOADS: u8 = 0x2;
const OMIT_POSITIONS: u8 = 0x4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    pub name: String,
    pub number: u32,
    pub indexed: bool,
    pub store_payloads: bool,
    /// Postings carry doc ids and frequencies only
    pub omit_positions: bool,
}

/// Field table of one segment, numbered densely in insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldInfos {
    by_number: Vec<FieldInfo>,
    by_name: HashMap<String, u32>,
}

impl FieldInfos {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_number.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_number.is_empty()
    }

    pub fn get(&self, number: u32) -> Option<&FieldInfo> {
        self.by_number.get(number as usize)
    }

    pub fn by_name(&self, name: &str) -> Option<&FieldInfo> {
        self.by_name.get(name).and_then(|&n| self.get(n))
    }

    pub fn name(&self, number: u32) -> Option<&str> {
        self.get(number).map(|f| f.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldInfo> {
        self.by_number.iter()
    }

    /// Add a field or widen an existing one; returns its number.
    ///
    /// Payload storage is sticky once any document stores payloads; a single
    /// document without positions turns positions off for the field.
    pub fn add(&mut self, name: &str, indexed: bool, store_payloads: bool, omit_positions: bool) -> u32 {
        if let Some(&number) = self.by_name.get(name) {
            let info = &mut self.by_number[number as usize];
            if indexed && !info.indexed {
                info.indexed = true;
                info.omit_positions = omit_positions;
            } else if indexed {
                info.omit_positions |= omit_positions;
            }
            info.store_payloads |= store_payloads;
            if info.omit_positions {
                info.store_payloads = false;
            }
            return number;
        }
        let number = self.by_number.len() as u32;
        self.by_number.push(FieldInfo {
            name: name.to_string(),
            number,
            indexed,
            store_payloads: store_payloads && !omit_positions,
            omit_positions: indexed && omit_positions,
        });
        self.by_name.insert(name.to_string(), number);
        number
    }

    /// Merge `other`'s fields in by name
    pub fn add_all(&mut self, other: &FieldInfos) {
        for info in other.iter() {
            self.add(&info.name, info.indexed, info.store_payloads, info.omit_positions);
        }
    }

    pub fn write(&self, dir: &dyn Directory, file_name: &str, params: &FormatParams) -> Result<()> {
        let mut out = IndexOutput::new(file_name);
        params.write_header(&mut out, FIELD_INFOS_CODEC);
        out.write_vint(self.by_number.len() as u32);
        for info in &self.by_number {
            out.write_string(&info.name);
            let mut flags = 0u8;
            if info.indexed {
                flags |= IS_INDEXED;
            }
            if info.store_payloads {
                flags |= STORE_PAYLOADS;
            }
            if info.omit_positions {
                flags |= OMIT_POSITIONS;
            }
            out.write_byte(flags);
        }
        params.write_trailer(&mut out);
        out.finish(dir)?;
        Ok(())
    }

    pub fn read(dir: &dyn Directory, file_name: &str, params: &FormatParams) -> Result<Self> {
        let mut input = dir.open_input(file_name)?;
        let end = params.check_trailer(&mut input)?;
        params.check_header(&mut input, FIELD_INFOS_CODEC)?;
        Self::read_from(&mut input, end)
    }

    fn read_from(input: &mut IndexInput, end: u64) -> Result<Self> {
        let count = input.read_vint()?;
        let mut infos = FieldInfos::new();
        for _ in 0..count {
            let name = input.read_string()?;
            let flags = input.read_byte()?;
            if flags & !(IS_INDEXED | STORE_PAYLOADS | OMIT_POSITIONS) != 0 {
                return Err(input.corrupt(format!("unknown field flags {:#x} for {}", flags, name)));
            }
            if infos.by_name.contains_key(&name) {
                return Err(input.corrupt(format!("duplicate field {}", name)));
            }
            let number = infos.by_number.len() as u32;
            infos.by_name.insert(name.clone(), number);
            infos.by_number.push(FieldInfo {
                name,
                number,
                indexed: flags & IS_INDEXED != 0,
                store_payloads: flags & STORE_PAYLOADS != 0,
                omit_positions: flags & OMIT_POSITIONS != 0,
            });
        }
        if input.position() != end {
            return Err(Error::corrupt(
                input.name(),
                input.position(),
                format!("field infos end at {}, file data ends at {}", input.position(), end),
            ));
        }
        Ok(infos)
    }
}
