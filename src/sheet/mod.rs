//! Spreadsheet capability
//!
//! The writer drives a live spreadsheet through the narrow [`Spreadsheet`]
//! trait. Implementations are not required to be `Send`: the handle is
//! created on the writer thread and never leaves it.
//!
//! Backends:
//! - [`MemorySheet`]: in-process grid, used for dry runs and tests
//! - [`BridgeSheet`]: external automation helper over JSON lines

pub mod address;
pub mod bridge;
pub mod memory;

pub use address::{column_letters, Cell, CellRange};
pub use bridge::BridgeSheet;
pub use memory::MemorySheet;

use serde::{Deserialize, Serialize};

use crate::Result;

/// Value held by one cell
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Empty,
    Number(f64),
    Text(String),
}

impl CellValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<u64> for CellValue {
    fn from(value: u64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// RGB colour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color(pub u8, pub u8, pub u8);

impl Color {
    pub const BLACK: Color = Color(0x00, 0x00, 0x00);
    pub const GREEN: Color = Color(0x00, 0x80, 0x00);
    pub const RED: Color = Color(0xFF, 0x00, 0x00);
    pub const LIGHT_GREEN: Color = Color(0xC6, 0xEF, 0xCE);
    pub const LIGHT_RED: Color = Color(0xFF, 0xC7, 0xCE);
    pub const ATM_YELLOW: Color = Color(0xFF, 0xEB, 0x9C);
    pub const HEADER_BLUE: Color = Color(0xDD, 0xEB, 0xF7);

    /// `#RRGGBB`
    pub fn hex(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.0, self.1, self.2)
    }
}

/// Cell background
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fill {
    None,
    Solid(Color),
}

/// Display format for numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberFormat {
    General,
    Integer,
    Decimal(u8),
    /// Value already in percent units; the sign is appended, not scaled
    Percent(u8),
    Time,
}

impl NumberFormat {
    /// Spreadsheet format code
    pub fn code(self) -> String {
        match self {
            Self::General => "General".to_string(),
            Self::Integer => "#,##0".to_string(),
            Self::Decimal(0) => "0".to_string(),
            Self::Decimal(places) => format!("0.{}", "0".repeat(places as usize)),
            Self::Percent(0) => "0\"%\"".to_string(),
            Self::Percent(places) => format!("0.{}\"%\"", "0".repeat(places as usize)),
            Self::Time => "hh:mm:ss".to_string(),
        }
    }
}

/// Horizontal alignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Align {
    Left,
    Center,
    Right,
}

/// Formatting patch: `None` leaves the attribute unchanged
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Style {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bold: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_color: Option<Color>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill: Option<Fill>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_format: Option<NumberFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub align: Option<Align>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border: Option<bool>,
}

impl Style {
    pub fn bold(mut self, bold: bool) -> Self {
        self.bold = Some(bold);
        self
    }

    pub fn font_color(mut self, color: Color) -> Self {
        self.font_color = Some(color);
        self
    }

    pub fn fill(mut self, fill: Fill) -> Self {
        self.fill = Some(fill);
        self
    }

    pub fn number_format(mut self, format: NumberFormat) -> Self {
        self.number_format = Some(format);
        self
    }

    pub fn align(mut self, align: Align) -> Self {
        self.align = Some(align);
        self
    }

    pub fn border(mut self, border: bool) -> Self {
        self.border = Some(border);
        self
    }

    /// Apply the set attributes of `patch` on top of `self`
    pub fn merged(mut self, patch: &Style) -> Self {
        self.bold = patch.bold.or(self.bold);
        self.font_color = patch.font_color.or(self.font_color);
        self.fill = patch.fill.or(self.fill);
        self.number_format = patch.number_format.or(self.number_format);
        self.align = patch.align.or(self.align);
        self.border = patch.border.or(self.border);
        self
    }
}

/// Live spreadsheet document
///
/// One workbook with one active sheet. Every call may fail independently;
/// callers decide whether a failure is fatal.
pub trait Spreadsheet {
    /// Create the workbook the writer will fill
    fn add_workbook(&mut self) -> Result<()>;

    fn set_value(&mut self, cell: Cell, value: CellValue) -> Result<()>;

    fn value(&mut self, cell: Cell) -> Result<CellValue>;

    fn set_style(&mut self, range: CellRange, style: &Style) -> Result<()>;

    fn merge(&mut self, range: CellRange) -> Result<()>;

    /// Publish a workbook-level name for a range
    fn define_name(&mut self, name: &str, range: CellRange) -> Result<()>;

    fn set_column_width(&mut self, col: u32, width: f64) -> Result<()>;

    fn autofit(&mut self, first_col: u32, last_col: u32) -> Result<()>;

    fn save(&mut self) -> Result<()>;

    /// Close the application and release the automation handle
    fn quit(&mut self) -> Result<()>;
}
