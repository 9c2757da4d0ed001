//! Static workbook layout
//!
//! Every coordinate the writer touches comes from this module. The sheet is
//! laid out top to bottom as:
//!
//! ```text
//! row 1        title (merged)
//! row 3        spot header,     rows 4..=8   one per index
//! row 11       futures header,  rows 12..=16 one per index
//! row 19..     one options block per index:
//!              block title (ATM shown here), column header,
//!              `strikes_per_block` strike rows, one blank row
//! ```
//!
//! Options blocks mirror the call side around the strike column: the call
//! LTP sits immediately left of the strike, the put LTP immediately right,
//! and each side grows outward in the same field order.

use crate::core::{IndexId, OptionType};
use crate::sheet::{Cell, CellRange, NumberFormat};

pub const TITLE_ROW: u32 = 1;
pub const SPOT_HEADER_ROW: u32 = 3;
pub const FUTURES_HEADER_ROW: u32 = 11;
pub const OPTIONS_START_ROW: u32 = 19;

/// Spot table columns
pub const SPOT_HEADERS: [&str; 8] = [
    "Index", "LTP", "Chg %", "Open", "High", "Low", "Close", "Updated",
];
pub const SPOT_LTP_COL: u32 = 2;
pub const SPOT_CHANGE_COL: u32 = 3;
pub const SPOT_OPEN_COL: u32 = 4;
pub const SPOT_STAMP_COL: u32 = 8;

/// Futures table columns
pub const FUTURES_HEADERS: [&str; 15] = [
    "Index", "Contract", "LTP", "Chg %", "Open", "High", "Low", "Close", "Volume", "OI", "Bid",
    "Bid Qty", "Ask", "Ask Qty", "Updated",
];
pub const FUTURES_CONTRACT_COL: u32 = 2;
pub const FUTURES_LTP_COL: u32 = 3;
pub const FUTURES_CHANGE_COL: u32 = 4;
pub const FUTURES_OPEN_COL: u32 = 5;
pub const FUTURES_VOLUME_COL: u32 = 9;
pub const FUTURES_BID_COL: u32 = 11;
pub const FUTURES_STAMP_COL: u32 = 15;

/// Column holding the strike price in every options block
pub const STRIKE_COL: u32 = LegField::ALL.len() as u32 + 1;
/// Rightmost column of an options block
pub const LAST_OPTION_COL: u32 = STRIKE_COL + LegField::ALL.len() as u32;

/// One field of an option leg, in order outward from the strike column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LegField {
    Ltp,
    ChangePct,
    Open,
    High,
    Low,
    Close,
    Volume,
    Oi,
    BidQty,
    Bid,
    Ask,
    AskQty,
    Iv,
    Delta,
    Gamma,
    Theta,
    Vega,
}

impl LegField {
    pub const ALL: [LegField; 17] = [
        LegField::Ltp,
        LegField::ChangePct,
        LegField::Open,
        LegField::High,
        LegField::Low,
        LegField::Close,
        LegField::Volume,
        LegField::Oi,
        LegField::BidQty,
        LegField::Bid,
        LegField::Ask,
        LegField::AskQty,
        LegField::Iv,
        LegField::Delta,
        LegField::Gamma,
        LegField::Theta,
        LegField::Vega,
    ];

    /// Distance from the strike column, minus one
    #[inline]
    pub const fn position(self) -> u32 {
        self as u32
    }

    pub const fn header(self) -> &'static str {
        match self {
            Self::Ltp => "LTP",
            Self::ChangePct => "Chg %",
            Self::Open => "Open",
            Self::High => "High",
            Self::Low => "Low",
            Self::Close => "Close",
            Self::Volume => "Volume",
            Self::Oi => "OI",
            Self::BidQty => "Bid Qty",
            Self::Bid => "Bid",
            Self::Ask => "Ask",
            Self::AskQty => "Ask Qty",
            Self::Iv => "IV",
            Self::Delta => "Delta",
            Self::Gamma => "Gamma",
            Self::Theta => "Theta",
            Self::Vega => "Vega",
        }
    }

    /// Display format for the column group this field belongs to
    pub const fn number_format(self) -> NumberFormat {
        match self {
            Self::Ltp | Self::Open | Self::High | Self::Low | Self::Close | Self::Bid | Self::Ask => {
                NumberFormat::Decimal(2)
            }
            Self::ChangePct | Self::Iv => NumberFormat::Percent(2),
            Self::Volume | Self::Oi | Self::BidQty | Self::AskQty => NumberFormat::Integer,
            Self::Delta | Self::Theta | Self::Vega => NumberFormat::Decimal(4),
            Self::Gamma => NumberFormat::Decimal(6),
        }
    }

    /// True for the five fields filled from the Greeks engine
    pub const fn is_greek(self) -> bool {
        matches!(
            self,
            Self::Iv | Self::Delta | Self::Gamma | Self::Theta | Self::Vega
        )
    }
}

/// Column of `field` on one side of the chain
#[inline]
pub const fn leg_col(side: OptionType, field: LegField) -> u32 {
    match side {
        OptionType::Call => STRIKE_COL - 1 - field.position(),
        OptionType::Put => STRIKE_COL + 1 + field.position(),
    }
}

/// Cell of `field` on one side of a strike row
#[inline]
pub const fn leg_cell(row: u32, side: OptionType, field: LegField) -> Cell {
    Cell::new(row, leg_col(side, field))
}

/// Row of an index in the spot table
#[inline]
pub const fn spot_row(index: IndexId) -> u32 {
    SPOT_HEADER_ROW + 1 + index.ordinal() as u32
}

/// Row of an index in the futures table
#[inline]
pub const fn futures_row(index: IndexId) -> u32 {
    FUTURES_HEADER_ROW + 1 + index.ordinal() as u32
}

/// Workbook name under which an index's strike rows are published
pub fn chain_name(index: IndexId) -> String {
    format!("CHAIN_{}", index.underlying())
}

/// Base row of every index's strike ladder
///
/// Assigned once when the layout is built and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowMap {
    base_rows: [u32; IndexId::ALL.len()],
}

impl RowMap {
    #[inline]
    pub fn base_row(&self, index: IndexId) -> u32 {
        self.base_rows[index.ordinal()]
    }

    /// Indices with their base rows, in display order
    pub fn iter(&self) -> impl Iterator<Item = (IndexId, u32)> + '_ {
        IndexId::ALL
            .into_iter()
            .map(move |index| (index, self.base_row(index)))
    }
}

/// Row geometry of the options blocks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetLayout {
    capacity: u32,
    rows: RowMap,
}

impl SheetLayout {
    /// Lay out one block per index with room for `strikes_per_block` strikes
    pub fn new(strikes_per_block: u32) -> Self {
        let capacity = strikes_per_block.max(1);
        let block_height = capacity + 3;
        let mut base_rows = [0; IndexId::ALL.len()];
        for index in IndexId::ALL {
            let title_row = OPTIONS_START_ROW + index.ordinal() as u32 * block_height;
            base_rows[index.ordinal()] = title_row + 2;
        }
        Self {
            capacity,
            rows: RowMap { base_rows },
        }
    }

    /// Strike rows available per block
    #[inline]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    #[inline]
    pub fn row_map(&self) -> &RowMap {
        &self.rows
    }

    /// Row holding the block title and ATM strike
    #[inline]
    pub fn block_title_row(&self, index: IndexId) -> u32 {
        self.rows.base_row(index) - 2
    }

    /// Row holding the column headers of a block
    #[inline]
    pub fn block_header_row(&self, index: IndexId) -> u32 {
        self.rows.base_row(index) - 1
    }

    /// Row of the strike with ladder rank `rank`, or `None` past the block capacity
    #[inline]
    pub fn strike_row(&self, index: IndexId, rank: usize) -> Option<u32> {
        let rank = u32::try_from(rank).ok()?;
        (rank < self.capacity).then(|| self.rows.base_row(index) + rank)
    }

    /// Strike rows of one block
    pub fn chain_range(&self, index: IndexId) -> CellRange {
        let base = self.rows.base_row(index);
        CellRange::new(
            Cell::new(base, 1),
            Cell::new(base + self.capacity - 1, LAST_OPTION_COL),
        )
    }

    /// Last row used by the layout
    pub fn last_row(&self) -> u32 {
        self.chain_range(IndexId::Sensex).end.row
    }
}

impl Default for SheetLayout {
    fn default() -> Self {
        Self::new(21)
    }
}
