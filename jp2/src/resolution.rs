//! Conversion of a Default Display Resolution box into a Capture Resolution box.
//!
//! The JP2 Header box may contain a Resolution box, which in turn contains a
//! Capture Resolution box, a Default Display Resolution box, or both. Both
//! sub-boxes carry the same fields, so rewriting the last byte of the type
//! tag (`resd` to `resc`) is a complete conversion and leaves every length,
//! offset and the codestream untouched.

use log::{info, warn};
use std::error;
use std::fmt;
use std::ops::Range;

use crate::byteconv::{bytes_to_signed_char, bytes_to_ushort_int};
use crate::{
    box_type_name, locate_box, BoxType, JBox, JBoxView, JP2Error, BOX_TYPE_CAPTURE_RESOLUTION,
    BOX_TYPE_DEFAULT_DISPLAY_RESOLUTION, BOX_TYPE_HEADER, BOX_TYPE_RESOLUTION,
};

// Skip LBox to reach TBox.
const BOX_TYPE_FIELD_OFFSET: usize = 4;

// 'd' in 'resd' and 'c' in 'resc'.
const DISCRIMINATOR_INDEX: usize = 3;

/// Why a file was left unconverted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoHeaderBox,
    NoResolutionBox,
    NoDisplayResolutionBox { capture_present: bool },
    CaptureResolutionPresent,
}

impl error::Error for SkipReason {}
impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::NoHeaderBox => write!(f, "No JP2 header box found"),
            Self::NoResolutionBox => write!(f, "No resolution box found"),
            Self::NoDisplayResolutionBox { capture_present } => {
                write!(f, "No display resolution box found")?;
                if *capture_present {
                    write!(f, ", input image already contains capture resolution box")?;
                }
                Ok(())
            }
            Self::CaptureResolutionPresent => {
                write!(f, "Input image already contains capture resolution box")
            }
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum ConversionOutcome {
    /// The whole file with the single type byte rewritten.
    Converted(Vec<u8>),
    /// Nothing may be written.
    Skipped(SkipReason),
}

impl ConversionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Converted(_))
    }

    pub fn into_data(self) -> Option<Vec<u8>> {
        match self {
            Self::Converted(data) => Some(data),
            Self::Skipped(_) => None,
        }
    }
}

// I.5.3.7.2
//
// Default Display Resolution box
//
// This box specifies a desired display grid resolution. Its fields have the
// same layout as those of the Capture Resolution box (I.5.3.7.1).
#[derive(Debug, Default, PartialEq)]
pub struct DefaultDisplayResolutionBox {
    length: u64,
    offset: usize,

    vertical_display_grid_resolution_numerator: u16,
    vertical_display_grid_resolution_denominator: u16,
    horizontal_display_grid_resolution_numerator: u16,
    horizontal_display_grid_resolution_denominator: u16,
    vertical_display_grid_resolution_exponent: i8,
    horizontal_display_grid_resolution_exponent: i8,
}

fn field(content: &[u8], range: Range<usize>) -> &[u8] {
    content.get(range).unwrap_or(&[])
}

impl DefaultDisplayResolutionBox {
    pub fn decode(jbox: &JBoxView) -> Result<Self, JP2Error> {
        let content = jbox.content();
        let u16_at = |start: usize| bytes_to_ushort_int(field(content, start..start + 2));
        let i8_at = |start: usize| bytes_to_signed_char(field(content, start..start + 1));

        Ok(Self {
            length: jbox.length(),
            offset: jbox.offset(),
            vertical_display_grid_resolution_numerator: u16_at(0)?,
            vertical_display_grid_resolution_denominator: u16_at(2)?,
            horizontal_display_grid_resolution_numerator: u16_at(4)?,
            horizontal_display_grid_resolution_denominator: u16_at(6)?,
            vertical_display_grid_resolution_exponent: i8_at(8)?,
            horizontal_display_grid_resolution_exponent: i8_at(9)?,
        })
    }

    pub fn vertical_display_grid_resolution_numerator(&self) -> u16 {
        self.vertical_display_grid_resolution_numerator
    }
    pub fn vertical_display_grid_resolution_denominator(&self) -> u16 {
        self.vertical_display_grid_resolution_denominator
    }
    pub fn horizontal_display_grid_resolution_numerator(&self) -> u16 {
        self.horizontal_display_grid_resolution_numerator
    }
    pub fn horizontal_display_grid_resolution_denominator(&self) -> u16 {
        self.horizontal_display_grid_resolution_denominator
    }
    pub fn vertical_display_grid_resolution_exponent(&self) -> i8 {
        self.vertical_display_grid_resolution_exponent
    }
    pub fn horizontal_display_grid_resolution_exponent(&self) -> i8 {
        self.horizontal_display_grid_resolution_exponent
    }

    // VRd = VRdN/VRdD * 10^VRdE, in grid points per metre
    pub fn vertical_display_grid_resolution(&self) -> f64 {
        f64::from(self.vertical_display_grid_resolution_numerator)
            / f64::from(self.vertical_display_grid_resolution_denominator)
            * 10_f64.powi(i32::from(self.vertical_display_grid_resolution_exponent))
    }

    // HRd = HRdN/HRdD * 10^HRdE, in grid points per metre
    pub fn horizontal_display_grid_resolution(&self) -> f64 {
        f64::from(self.horizontal_display_grid_resolution_numerator)
            / f64::from(self.horizontal_display_grid_resolution_denominator)
            * 10_f64.powi(i32::from(self.horizontal_display_grid_resolution_exponent))
    }
}

impl JBox for DefaultDisplayResolutionBox {
    // The type of a Default Display Resolution box shall be ‘resd’ (0x7265 7364).
    fn identifier(&self) -> BoxType {
        BOX_TYPE_DEFAULT_DISPLAY_RESOLUTION
    }

    fn length(&self) -> u64 {
        self.length
    }

    fn offset(&self) -> usize {
        self.offset
    }
}

fn required<'a>(
    data: &'a [u8],
    box_type: BoxType,
    missing: SkipReason,
) -> Result<JBoxView<'a>, SkipReason> {
    match locate_box(data, box_type) {
        Some(jbox) => {
            info!(
                "{:?} box found at offset {} length {}",
                box_type_name(&box_type),
                jbox.offset(),
                jbox.length()
            );
            Ok(jbox)
        }
        None => Err(missing),
    }
}

/// Absolute offset of the byte to rewrite, i.e. the 4th byte of the type
/// field of the Default Display Resolution box.
pub fn display_resolution_type_offset(data: &[u8]) -> Result<usize, SkipReason> {
    let header_box = required(data, BOX_TYPE_HEADER, SkipReason::NoHeaderBox)?;
    let resolution_box = required(
        header_box.content(),
        BOX_TYPE_RESOLUTION,
        SkipReason::NoResolutionBox,
    )?;

    // Both sub-boxes live at the same level inside the Resolution box.
    let display_box = locate_box(resolution_box.content(), BOX_TYPE_DEFAULT_DISPLAY_RESOLUTION);
    let capture_box = locate_box(resolution_box.content(), BOX_TYPE_CAPTURE_RESOLUTION);
    let display_box = match (display_box, capture_box) {
        (None, capture_box) => {
            return Err(SkipReason::NoDisplayResolutionBox {
                capture_present: capture_box.is_some(),
            })
        }
        (Some(_), Some(_)) => return Err(SkipReason::CaptureResolutionPresent),
        (Some(display_box), None) => display_box,
    };

    match DefaultDisplayResolutionBox::decode(&display_box) {
        Ok(resolution) => info!(
            "DisplayResolutionBox vertical {} horizontal {} grid points per metre",
            resolution.vertical_display_grid_resolution(),
            resolution.horizontal_display_grid_resolution()
        ),
        Err(error) => warn!("DisplayResolutionBox fields unreadable: {}", error),
    }

    // Each level's offsets are relative to its parent's content, so add the
    // measured header width of every enclosing box.
    Ok(header_box.content_start()
        + resolution_box.content_start()
        + display_box.offset()
        + BOX_TYPE_FIELD_OFFSET
        + DISCRIMINATOR_INDEX)
}

/// Rewrite the Default Display Resolution box of `data` into a Capture
/// Resolution box, returning the offset of the single byte changed.
///
/// `data` is untouched when the conversion is skipped.
pub fn convert_in_place(data: &mut [u8]) -> Result<usize, SkipReason> {
    let offset = match display_resolution_type_offset(data) {
        Ok(offset) => offset,
        Err(reason) => {
            warn!("{}", reason);
            return Err(reason);
        }
    };

    debug_assert_eq!(
        data[offset],
        BOX_TYPE_DEFAULT_DISPLAY_RESOLUTION[DISCRIMINATOR_INDEX]
    );
    data[offset] = BOX_TYPE_CAPTURE_RESOLUTION[DISCRIMINATOR_INDEX];
    info!("Changed box type resd to resc at offset {}", offset);

    Ok(offset)
}

/// Convert a whole file held in memory.
pub fn convert_display_to_capture(mut data: Vec<u8>) -> ConversionOutcome {
    match convert_in_place(&mut data) {
        Ok(_) => ConversionOutcome::Converted(data),
        Err(reason) => ConversionOutcome::Skipped(reason),
    }
}
