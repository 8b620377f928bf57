use log::{debug, warn};
use std::error;
use std::fmt;

pub mod byteconv;
pub mod resolution;

use byteconv::{bytes_to_hex, bytes_to_text, bytes_to_uint, bytes_to_ulonglong, DecodeError};

#[derive(Debug, PartialEq)]
pub enum JP2Error {
    BoxTruncated {
        offset: usize,
        available: usize,
    },
    BoxMalformed {
        box_type: BoxType,
        offset: usize,
        length: u64,
    },
    Decode(DecodeError),
}

impl error::Error for JP2Error {}
impl fmt::Display for JP2Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::BoxTruncated { offset, available } => {
                write!(
                    f,
                    "truncated box header at offset {} ({} byte(s) available)",
                    offset, available
                )
            }
            Self::BoxMalformed {
                box_type,
                offset,
                length,
            } => {
                write!(
                    f,
                    "malformed box type {:?} at offset {} with length {}",
                    box_type_name(box_type),
                    offset,
                    length
                )
            }
            Self::Decode(error) => write!(f, "{}", error),
        }
    }
}

impl From<DecodeError> for JP2Error {
    fn from(error: DecodeError) -> Self {
        Self::Decode(error)
    }
}

pub type BoxType = [u8; 4];

// jp2h (0x6A70 3268)
pub const BOX_TYPE_HEADER: BoxType = [106, 112, 50, 104];
// res\040 (0x7265 7320)
pub const BOX_TYPE_RESOLUTION: BoxType = [114, 101, 115, 32];
// resc (0x7265 7363)
pub const BOX_TYPE_CAPTURE_RESOLUTION: BoxType = [114, 101, 115, 99];
// resd (0x7265 7364)
pub const BOX_TYPE_DEFAULT_DISPLAY_RESOLUTION: BoxType = [114, 101, 115, 100];

// LBox + TBox
const BOX_HEADER_LENGTH: usize = 8;
// LBox + TBox + XLBox
const EXTENDED_BOX_HEADER_LENGTH: usize = 16;

/// Printable form of a box type: the tag itself when it is plain text,
/// otherwise its hexadecimal value.
pub fn box_type_name(box_type: &BoxType) -> String {
    let text = bytes_to_text(box_type);
    if text.is_empty() {
        format!("0x{}", bytes_to_hex(box_type))
    } else {
        text
    }
}

/// JPEG 2000 box trait.
///
/// The building-block of the JP2 file format is called a box. All
/// information contained within a JP2 (and JPX, JPM) file is encapsulated in
/// boxes, and some boxes are defined to contain other boxes.
///
/// For more information, see ISO/IEC 15444-1 / ITU T-800 Appendix I.4.
pub trait JBox {
    fn identifier(&self) -> BoxType;
    fn length(&self) -> u64;
    fn offset(&self) -> usize;
}

/// A box read from a byte buffer.
///
/// The content borrows from the buffer the box was read from; offsets are
/// relative to the start of that buffer, not necessarily to the file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JBoxView<'a> {
    // Box Length
    //
    // The total length of the box including the LBox, TBox and (if present)
    // XLBox fields, after resolving the 0 and 1 conventions.
    length: u64,

    // Box Type
    //
    // Kept as raw bytes. Boxes are generally referred to by an ISO 646
    // character string translation, with a space shown as “\040”.
    box_type: BoxType,

    offset: usize,

    // 8, or 16 when the length was given in the XLBox field.
    header_length: usize,

    content: &'a [u8],
}

impl<'a> JBoxView<'a> {
    pub fn header_length(&self) -> usize {
        self.header_length
    }

    /// Offset of the first content byte within the buffer.
    pub fn content_start(&self) -> usize {
        self.offset + self.header_length
    }

    /// Offset of the first byte after this box within the buffer.
    pub fn end(&self) -> usize {
        self.content_start() + self.content.len()
    }

    pub fn content(&self) -> &'a [u8] {
        self.content
    }
}

impl<'a> JBox for JBoxView<'a> {
    fn identifier(&self) -> BoxType {
        self.box_type
    }

    fn length(&self) -> u64 {
        self.length
    }

    fn offset(&self) -> usize {
        self.offset
    }
}

/// Outcome of a [`locate_box`] scan. `None` when no sibling box matched.
pub type BoxSearchResult<'a> = Option<JBoxView<'a>>;

/// Read the box starting at `offset` in `data`.
///
/// A box whose declared length is shorter than its own header, or runs past
/// the end of `data`, is rejected rather than sliced.
pub fn read_box(data: &[u8], offset: usize) -> Result<JBoxView<'_>, JP2Error> {
    let available = data.len().saturating_sub(offset);
    if available < BOX_HEADER_LENGTH {
        return Err(JP2Error::BoxTruncated { offset, available });
    }

    let box_length_value = bytes_to_uint(&data[offset..offset + 4])?;
    let mut box_type: BoxType = [0; 4];
    box_type.copy_from_slice(&data[offset + 4..offset + 8]);

    let mut header_length = BOX_HEADER_LENGTH;
    let length = match box_length_value {
        // If the value of this field is 0, then the length of the box was not
        // known when the LBox field was written. In this case, this box
        // contains all bytes up to the end of the file.
        0 => available as u64,
        // If the value of this field is 1, then the XLBox field shall exist
        // and the value of that field shall be the actual length of the box,
        // including the LBox, TBox and XLBox fields.
        1 => {
            if available < EXTENDED_BOX_HEADER_LENGTH {
                return Err(JP2Error::BoxTruncated { offset, available });
            }
            header_length = EXTENDED_BOX_HEADER_LENGTH;
            bytes_to_ulonglong(&data[offset + 8..offset + 16])?
        }
        value => u64::from(value),
    };

    // The values 2-7 are reserved for ISO use and can never hold a header.
    if length < header_length as u64 || length > available as u64 {
        return Err(JP2Error::BoxMalformed {
            box_type,
            offset,
            length,
        });
    }

    let end = offset + length as usize;
    Ok(JBoxView {
        length,
        box_type,
        offset,
        header_length,
        content: &data[offset + header_length..end],
    })
}

/// Find the first box of type `target` among the sibling boxes of `data`.
///
/// Only one nesting level is scanned; call again on the located box's
/// content to descend. A malformed box ends the scan as "not found".
pub fn locate_box(data: &[u8], target: BoxType) -> BoxSearchResult<'_> {
    let mut offset = 0;
    while offset < data.len() {
        let jbox = match read_box(data, offset) {
            Ok(jbox) => jbox,
            Err(error) => {
                warn!(
                    "{}, giving up search for {:?}",
                    error,
                    box_type_name(&target)
                );
                return None;
            }
        };
        debug!(
            "{:?} box at offset {} length {}",
            box_type_name(&jbox.box_type),
            jbox.offset,
            jbox.length
        );

        if jbox.box_type == target {
            return Some(jbox);
        }
        offset = jbox.end();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jbox(box_type: &[u8; 4], content: &[u8]) -> Vec<u8> {
        let mut data = ((content.len() + 8) as u32).to_be_bytes().to_vec();
        data.extend_from_slice(box_type);
        data.extend_from_slice(content);
        data
    }

    #[test]
    fn test_read_box() {
        let mut data = vec![0xff; 3];
        data.extend(jbox(b"xml ", b"<a/>"));
        let result = read_box(&data, 3).unwrap();
        assert_eq!(result.identifier(), *b"xml ");
        assert_eq!(result.length(), 12);
        assert_eq!(result.offset(), 3);
        assert_eq!(result.header_length(), 8);
        assert_eq!(result.content_start(), 11);
        assert_eq!(result.end(), 3 + 12);
        assert_eq!(result.content(), b"<a/>");
    }

    #[test]
    fn test_read_box_extended_length() {
        let mut data = vec![0, 0, 0, 1];
        data.extend_from_slice(b"jp2c");
        data.extend_from_slice(&20_u64.to_be_bytes());
        data.extend_from_slice(&[1, 2, 3, 4]);
        data.extend(jbox(b"free", &[]));

        let result = read_box(&data, 0).unwrap();
        assert_eq!(result.length(), 20);
        assert_eq!(result.header_length(), 16);
        assert_eq!(result.content_start(), 16);
        assert_eq!(result.end(), 20);
        assert_eq!(result.content(), &[1, 2, 3, 4]);
    }

    #[test]
    fn test_read_box_zero_length_runs_to_end() {
        let mut data = jbox(b"ftyp", b"jp2 ");
        data.extend_from_slice(&[0, 0, 0, 0]);
        data.extend_from_slice(b"jp2c");
        data.extend_from_slice(&[0xff, 0x4f, 0xff, 0x51, 0x00]);

        let result = read_box(&data, 12).unwrap();
        assert_eq!(result.length(), (data.len() - 12) as u64);
        assert_eq!(result.end(), data.len());
        assert_eq!(result.content(), &[0xff, 0x4f, 0xff, 0x51, 0x00]);
    }

    #[test]
    fn test_read_box_past_end_is_malformed() {
        let mut data = jbox(b"jp2h", &[0; 4]);
        data[3] = 40;
        assert_eq!(
            read_box(&data, 0),
            Err(JP2Error::BoxMalformed {
                box_type: *b"jp2h",
                offset: 0,
                length: 40
            })
        );
    }

    #[test]
    fn test_read_box_reserved_length_is_malformed() {
        let mut data = jbox(b"jp2h", &[0; 4]);
        data[3] = 5;
        assert!(matches!(
            read_box(&data, 0),
            Err(JP2Error::BoxMalformed { length: 5, .. })
        ));

        let mut data = vec![0, 0, 0, 1];
        data.extend_from_slice(b"jp2h");
        data.extend_from_slice(&0_u64.to_be_bytes());
        assert!(matches!(
            read_box(&data, 0),
            Err(JP2Error::BoxMalformed { length: 0, .. })
        ));
    }

    #[test]
    fn test_read_box_truncated_header() {
        let data = [0, 0, 0, 1, b'j', b'p', b'2', b'c', 0, 0];
        assert_eq!(
            read_box(&data, 0),
            Err(JP2Error::BoxTruncated {
                offset: 0,
                available: 10
            })
        );
        assert_eq!(
            read_box(&data, 6),
            Err(JP2Error::BoxTruncated {
                offset: 6,
                available: 4
            })
        );
        assert!(read_box(&data, 64).is_err());
    }

    #[test]
    fn test_locate_box() {
        let mut data = jbox(b"ftyp", b"jp2 ");
        data.extend(jbox(b"xml ", b"first"));
        data.extend(jbox(b"xml ", b"second"));

        let result = locate_box(&data, *b"xml ").unwrap();
        assert_eq!(result.offset(), 12);
        assert_eq!(result.content(), b"first");

        assert!(locate_box(&data, BOX_TYPE_HEADER).is_none());
        assert!(locate_box(&[], BOX_TYPE_HEADER).is_none());
    }

    #[test]
    fn test_locate_box_is_single_level() {
        let inner = jbox(b"resd", &[0; 10]);
        let data = jbox(b"res ", &inner);
        assert!(locate_box(&data, BOX_TYPE_DEFAULT_DISPLAY_RESOLUTION).is_none());

        let resolution = locate_box(&data, BOX_TYPE_RESOLUTION).unwrap();
        let display = locate_box(resolution.content(), BOX_TYPE_DEFAULT_DISPLAY_RESOLUTION);
        assert_eq!(display.map(|b| b.offset()), Some(0));
    }

    #[test]
    fn test_locate_box_stops_at_malformed_box() {
        let mut data = jbox(b"ftyp", b"jp2 ");
        data.extend_from_slice(&[0, 0, 0, 2]);
        data.extend_from_slice(b"uuid");
        data.extend(jbox(b"jp2h", &[]));
        assert!(locate_box(&data, BOX_TYPE_HEADER).is_none());
    }

    #[test]
    fn test_box_type_name() {
        assert_eq!(box_type_name(&BOX_TYPE_RESOLUTION), "res ");
        assert_eq!(box_type_name(&[0x0d, 0x0a, 0x87, 0x0a]), "0x0d0a870a");
    }
}
