//! Cross-reference table.
//!
//! Unified representation of free, reserved, uncompressed and compressed
//! entries. Reads both the classical `xref` section format and the packed
//! payload of `/Type /XRef` cross-reference streams, and emits either form.
//!
//! The id-0, generation-65535 free-list head is synthesized on emit and
//! never stored explicitly. Reserved entries exist only transiently during
//! writing to block object-id allocation.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::reader::ByteReader;

/// A single cross-reference entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XrefEntry {
    /// Free object slot
    Free {
        /// Generation the slot would be reused with
        gen: u16,
    },
    /// Transient writer-side reservation blocking id allocation
    Reserved {
        /// Generation of the reserved object
        gen: u16,
    },
    /// Object stored uncompressed in the file body
    Uncompressed {
        /// Generation number
        gen: u16,
        /// Byte offset of `id gen obj`
        offset: u64,
    },
    /// Object packed inside an object-stream container (generation 0)
    Compressed {
        /// Container object id
        container: u32,
        /// Index within the container
        index: u32,
    },
}

impl XrefEntry {
    /// Generation number of this entry; compressed entries are always 0.
    pub fn gen(&self) -> u16 {
        match self {
            XrefEntry::Free { gen } => *gen,
            XrefEntry::Reserved { gen } => *gen,
            XrefEntry::Uncompressed { gen, .. } => *gen,
            XrefEntry::Compressed { .. } => 0,
        }
    }
}

/// Cross-reference table mapping object ids to entries.
#[derive(Debug, Clone, Default)]
pub struct XrefTable {
    entries: BTreeMap<u32, XrefEntry>,
}

impl XrefTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Look up the entry for an object id.
    pub fn get(&self, id: u32) -> Option<&XrefEntry> {
        self.entries.get(&id)
    }

    /// Insert or replace the entry for an object id.
    pub fn add_entry(&mut self, id: u32, entry: XrefEntry) {
        self.entries.insert(id, entry);
    }

    /// Iterate entries in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &XrefEntry)> {
        self.entries.iter().map(|(id, entry)| (*id, entry))
    }

    /// Highest id present, 0 when empty.
    pub fn max_id(&self) -> u32 {
        self.entries.keys().next_back().copied().unwrap_or(0)
    }

    /// Lowest positive id with no entry.
    pub fn free_id(&self) -> u32 {
        let mut candidate = 1;
        for &id in self.entries.keys() {
            if id < candidate {
                continue;
            }
            if id == candidate {
                candidate += 1;
            } else {
                break;
            }
        }
        candidate
    }

    /// Reserve the lowest free id, blocking it for later allocation.
    pub fn reserve_free_id(&mut self) -> u32 {
        let id = self.free_id();
        self.add_entry(id, XrefEntry::Reserved { gen: 0 });
        id
    }

    /// Read classical xref subsections; the cursor must sit after the
    /// `xref` keyword line. Malformed subsections end the scan with a
    /// warning rather than an error (the reader is tolerant).
    pub fn read_classical_sections(&mut self, reader: &mut ByteReader<'_>) {
        loop {
            let section_start = reader.tell();
            let header = reader.read_line();
            let header_text = String::from_utf8_lossy(header);
            let parts: Vec<&str> = header_text.split_whitespace().collect();
            if parts.len() != 2 {
                reader.seek(section_start);
                return;
            }
            let (start_id, count) = match (parts[0].parse::<u32>(), parts[1].parse::<u32>()) {
                (Ok(s), Ok(c)) => (s, c),
                _ => {
                    reader.seek(section_start);
                    return;
                }
            };
            log::debug!("xref subsection: {} entries starting at id {}", count, start_id);

            for id in start_id..start_id + count {
                let line = reader.read_line();
                let text = String::from_utf8_lossy(line);
                let fields: Vec<&str> = text.split_whitespace().collect();
                if fields.len() != 3 {
                    log::warn!("malformed xref line for id {}: {:?}", id, text);
                    continue;
                }
                let offset: u64 = match fields[0].parse() {
                    Ok(v) => v,
                    Err(_) => {
                        log::warn!("malformed xref offset for id {}: {:?}", id, text);
                        continue;
                    }
                };
                let gen: u16 = fields[1].parse().unwrap_or(0);
                match fields[2] {
                    "n" => self.add_entry(id, XrefEntry::Uncompressed { gen, offset }),
                    "f" => {
                        // The id-0 free head is synthesized, never stored.
                        if id != 0 {
                            self.add_entry(id, XrefEntry::Free { gen });
                        }
                    }
                    other => log::warn!("unknown xref entry kind {:?} for id {}", other, id),
                }
            }
        }
    }

    /// Ingest the decoded payload of a cross-reference stream.
    ///
    /// `index` lists `(first_id, count)` runs; `widths` is the decoded /W
    /// triple. Entries are `w1+w2+w3` bytes big-endian; a zero-width type
    /// field defaults to type 1.
    pub fn read_stream_data(
        &mut self,
        data: &[u8],
        index: &[(u32, u32)],
        widths: [usize; 3],
    ) -> Result<()> {
        let entry_width: usize = widths.iter().sum();
        if entry_width == 0 {
            return Err(Error::Decode("xref stream /W is all zeros".to_string()));
        }
        if !data.len().is_multiple_of(entry_width) {
            return Err(Error::Decode(format!(
                "xref stream payload of {} bytes is not a multiple of entry width {}",
                data.len(),
                entry_width
            )));
        }

        let total: u64 = index.iter().map(|(_, count)| *count as u64).sum();
        if total != (data.len() / entry_width) as u64 {
            return Err(Error::Decode(format!(
                "xref stream /Index declares {} entries, payload holds {}",
                total,
                data.len() / entry_width
            )));
        }

        let mut rows = data.chunks(entry_width);
        for &(first_id, count) in index {
            for id in first_id..first_id + count {
                let row = rows.next().expect("row count checked above");
                let type_field = if widths[0] == 0 {
                    1
                } else {
                    be_int(&row[..widths[0]])
                };
                let field_2 = be_int(&row[widths[0]..widths[0] + widths[1]]);
                let field_3 = be_int(&row[widths[0] + widths[1]..]);
                match type_field {
                    0 => {
                        if id != 0 {
                            self.add_entry(id, XrefEntry::Free { gen: field_3 as u16 });
                        }
                    }
                    1 => self.add_entry(
                        id,
                        XrefEntry::Uncompressed {
                            gen: field_3 as u16,
                            offset: field_2,
                        },
                    ),
                    2 => self.add_entry(
                        id,
                        XrefEntry::Compressed {
                            container: field_2 as u32,
                            index: field_3 as u32,
                        },
                    ),
                    other => {
                        log::warn!("unknown xref stream entry type {} for id {}", other, id)
                    }
                }
            }
        }
        Ok(())
    }

    /// Emit the classical form: one contiguous `0 N` section with the
    /// synthesized free head and one 20-byte line per id.
    pub fn write_classical(&self, out: &mut Vec<u8>) -> Result<()> {
        let max_id = self.max_id();
        out.extend_from_slice(b"xref\n");
        out.extend_from_slice(format!("0 {}\n", max_id + 1).as_bytes());
        out.extend_from_slice(b"0000000000 65535 f \n");
        for id in 1..=max_id {
            match self.entries.get(&id) {
                Some(XrefEntry::Uncompressed { gen, offset }) => {
                    out.extend_from_slice(format!("{:010} {:05} n \n", offset, gen).as_bytes());
                }
                Some(XrefEntry::Compressed { .. }) => {
                    return Err(Error::ConfigConflict(
                        "compressed xref entries cannot be written as a classical table"
                            .to_string(),
                    ));
                }
                // Holes, free and leftover reservations are free lines.
                _ => out.extend_from_slice(b"0000000000 65535 f \n"),
            }
        }
        Ok(())
    }

    /// Pack the stream form: returns the /W widths and the row payload for
    /// `/Index [0, maxId+1]`. Widths are the minimal byte counts that fit
    /// the maximum field values, keeping output deterministic.
    pub fn pack_stream_data(&self) -> ([usize; 3], Vec<u8>) {
        let max_id = self.max_id();
        let mut max_field_2: u64 = 0;
        let mut max_field_3: u64 = 65535;
        for entry in self.entries.values() {
            match entry {
                XrefEntry::Uncompressed { gen, offset } => {
                    max_field_2 = max_field_2.max(*offset);
                    max_field_3 = max_field_3.max(*gen as u64);
                }
                XrefEntry::Compressed { container, index } => {
                    max_field_2 = max_field_2.max(*container as u64);
                    max_field_3 = max_field_3.max(*index as u64);
                }
                _ => {}
            }
        }
        let widths = [1, be_width(max_field_2), be_width(max_field_3)];

        let mut data = Vec::with_capacity((max_id as usize + 1) * (1 + widths[1] + widths[2]));
        for id in 0..=max_id {
            let (type_field, field_2, field_3): (u64, u64, u64) = if id == 0 {
                (0, 0, 65535)
            } else {
                match self.entries.get(&id) {
                    Some(XrefEntry::Uncompressed { gen, offset }) => (1, *offset, *gen as u64),
                    Some(XrefEntry::Compressed { container, index }) => {
                        (2, *container as u64, *index as u64)
                    }
                    _ => (0, 0, 65535),
                }
            };
            push_be(&mut data, type_field, widths[0]);
            push_be(&mut data, field_2, widths[1]);
            push_be(&mut data, field_3, widths[2]);
        }
        (widths, data)
    }
}

/// Big-endian integer from a byte slice.
fn be_int(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

/// Minimal byte width that fits `value` (at least 1).
fn be_width(value: u64) -> usize {
    let mut width = 1;
    let mut remaining = value >> 8;
    while remaining > 0 {
        width += 1;
        remaining >>= 8;
    }
    width
}

fn push_be(out: &mut Vec<u8>, value: u64, width: usize) {
    for shift in (0..width).rev() {
        out.push(((value >> (shift * 8)) & 0xFF) as u8);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_id_skips_present_ids() {
        let mut table = XrefTable::new();
        table.add_entry(1, XrefEntry::Uncompressed { gen: 0, offset: 10 });
        table.add_entry(2, XrefEntry::Uncompressed { gen: 0, offset: 20 });
        table.add_entry(4, XrefEntry::Uncompressed { gen: 0, offset: 40 });
        assert_eq!(table.free_id(), 3);
        assert_eq!(table.reserve_free_id(), 3);
        assert_eq!(table.free_id(), 5);
    }

    #[test]
    fn test_read_classical_sections() {
        let text = b"0 3\n0000000000 65535 f \n0000000018 00000 n \n0000000154 00002 n \ntrailer\n";
        let mut reader = ByteReader::new(text);
        let mut table = XrefTable::new();
        table.read_classical_sections(&mut reader);
        assert_eq!(table.len(), 2);
        assert_eq!(
            table.get(1),
            Some(&XrefEntry::Uncompressed { gen: 0, offset: 18 })
        );
        assert_eq!(
            table.get(2),
            Some(&XrefEntry::Uncompressed { gen: 2, offset: 154 })
        );
        // Cursor rewound to the start of the non-subsection line.
        assert_eq!(reader.read_line(), b"trailer");
    }

    #[test]
    fn test_read_classical_multiple_subsections() {
        let text = b"0 1\n0000000000 65535 f \n5 2\n0000000100 00000 n \n0000000200 00000 n \n";
        let mut reader = ByteReader::new(text);
        let mut table = XrefTable::new();
        table.read_classical_sections(&mut reader);
        assert_eq!(
            table.get(5),
            Some(&XrefEntry::Uncompressed { gen: 0, offset: 100 })
        );
        assert_eq!(
            table.get(6),
            Some(&XrefEntry::Uncompressed { gen: 0, offset: 200 })
        );
    }

    #[test]
    fn test_read_stream_data_w131() {
        // 1 free + 4 uncompressed + 1 compressed, /W [1 3 1], /Index [0 6]
        let mut data = Vec::new();
        data.extend_from_slice(&[0, 0, 0, 0, 255]); // id 0 free
        for offset in [15u64, 300, 70000, 90] {
            data.push(1);
            data.extend_from_slice(&offset.to_be_bytes()[5..]);
            data.push(0);
        }
        data.extend_from_slice(&[2, 0, 0, 2, 7]); // id 5 inside container 2, index 7

        let mut table = XrefTable::new();
        table
            .read_stream_data(&data, &[(0, 6)], [1, 3, 1])
            .unwrap();
        assert_eq!(table.len(), 5);
        assert_eq!(
            table.get(3),
            Some(&XrefEntry::Uncompressed { gen: 0, offset: 70000 })
        );
        assert_eq!(
            table.get(5),
            Some(&XrefEntry::Compressed { container: 2, index: 7 })
        );
        assert_eq!(table.get(0), None);
    }

    #[test]
    fn test_read_stream_data_ragged_fails() {
        let mut table = XrefTable::new();
        assert!(table.read_stream_data(&[1, 2, 3, 4], &[(0, 1)], [1, 3, 1]).is_err());
        assert!(table.read_stream_data(&[1, 2, 3, 4, 5], &[(0, 2)], [1, 3, 1]).is_err());
    }

    #[test]
    fn test_write_classical_with_holes() {
        let mut table = XrefTable::new();
        table.add_entry(1, XrefEntry::Uncompressed { gen: 0, offset: 18 });
        table.add_entry(3, XrefEntry::Uncompressed { gen: 1, offset: 99 });
        let mut out = Vec::new();
        table.write_classical(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "xref");
        assert_eq!(lines[1], "0 4");
        assert_eq!(lines[2], "0000000000 65535 f ");
        assert_eq!(lines[3], "0000000018 00000 n ");
        assert_eq!(lines[4], "0000000000 65535 f "); // hole at id 2
        assert_eq!(lines[5], "0000000099 00001 n ");
        // every entry line is exactly 20 bytes including the newline
        for line in &lines[2..] {
            assert_eq!(line.len() + 1, 20);
        }
    }

    #[test]
    fn test_classical_rejects_compressed_entries() {
        let mut table = XrefTable::new();
        table.add_entry(1, XrefEntry::Compressed { container: 2, index: 0 });
        assert!(table.write_classical(&mut Vec::new()).is_err());
    }

    #[test]
    fn test_pack_stream_roundtrip() {
        let mut table = XrefTable::new();
        table.add_entry(1, XrefEntry::Uncompressed { gen: 0, offset: 17 });
        table.add_entry(2, XrefEntry::Uncompressed { gen: 0, offset: 70000 });
        table.add_entry(3, XrefEntry::Compressed { container: 2, index: 1 });
        let (widths, data) = table.pack_stream_data();
        assert_eq!(widths[0], 1);
        assert_eq!(widths[1], 3); // 70000 needs 3 bytes
        assert_eq!(widths[2], 2); // synthesized 65535 head needs 2 bytes

        let mut reparsed = XrefTable::new();
        reparsed
            .read_stream_data(&data, &[(0, table.max_id() + 1)], widths)
            .unwrap();
        assert_eq!(reparsed.get(1), table.get(1));
        assert_eq!(reparsed.get(2), table.get(2));
        assert_eq!(reparsed.get(3), table.get(3));
    }

    #[test]
    fn test_reserved_entries_block_allocation_and_emit_as_free() {
        let mut table = XrefTable::new();
        table.add_entry(1, XrefEntry::Reserved { gen: 0 });
        assert_eq!(table.free_id(), 2);
        let mut out = Vec::new();
        table.write_classical(&mut out).unwrap();
        assert!(String::from_utf8(out).unwrap().contains("0000000000 65535 f "));
    }
}
