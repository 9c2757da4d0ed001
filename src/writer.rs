//! Update pass
//!
//! [`SheetWriter`] owns the spreadsheet handle and the Greeks engine and
//! turns one [`Snapshot`] into cell writes. Every symbol and every option
//! leg is written inside its own error boundary: a failure is logged,
//! counted in the [`PassReport`] and the pass moves on.

use time::{Date, OffsetDateTime};

use crate::core::{
    format_stamp, is_atm, time_to_expiry, FuturesQuote, IndexId, Leg, MarketQuote, OptionType,
    PriceFields, Snapshot, StrikeLadder, StrikeRow,
};
use crate::greeks::GreeksEngine;
use crate::layout::{
    chain_name, futures_row, leg_cell, leg_col, spot_row, LegField, SheetLayout,
    FUTURES_BID_COL, FUTURES_CHANGE_COL, FUTURES_CONTRACT_COL, FUTURES_HEADERS,
    FUTURES_HEADER_ROW, FUTURES_LTP_COL, FUTURES_OPEN_COL, FUTURES_STAMP_COL, FUTURES_VOLUME_COL,
    LAST_OPTION_COL, SPOT_CHANGE_COL, SPOT_HEADERS, SPOT_HEADER_ROW, SPOT_LTP_COL, SPOT_OPEN_COL,
    SPOT_STAMP_COL, STRIKE_COL, TITLE_ROW,
};
use crate::sheet::{Align, Cell, CellRange, CellValue, Color, Fill, NumberFormat, Spreadsheet, Style};
use crate::{FeedError, Result};

/// Counts from one update pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    pub spot_rows: usize,
    pub futures_rows: usize,
    pub strike_rows: usize,
    pub legs: usize,
    pub greeks: usize,
    /// Symbols, legs or cells skipped because of an error
    pub errors: usize,
}

/// Writes snapshots into a laid-out workbook
pub struct SheetWriter<S, G> {
    sheet: S,
    greeks: G,
    layout: SheetLayout,
    title: String,
    /// Strike rows written by the previous pass, per index
    rendered: [u32; IndexId::ALL.len()],
}

impl<S: Spreadsheet, G: GreeksEngine> SheetWriter<S, G> {
    pub fn new(sheet: S, greeks: G, layout: SheetLayout, title: impl Into<String>) -> Self {
        Self {
            sheet,
            greeks,
            layout,
            title: title.into(),
            rendered: [0; IndexId::ALL.len()],
        }
    }

    #[inline]
    pub fn layout(&self) -> &SheetLayout {
        &self.layout
    }

    /// Create the workbook and lay out the static blocks
    ///
    /// Any failure here is fatal for the writer.
    pub fn initialize(&mut self) -> Result<()> {
        self.sheet.add_workbook()?;

        let header = Style::default()
            .bold(true)
            .fill(Fill::Solid(Color::HEADER_BLUE))
            .align(Align::Center)
            .border(true);

        // Title
        let title_range = CellRange::row_span(TITLE_ROW, 1, LAST_OPTION_COL);
        self.sheet.set_value(Cell::new(TITLE_ROW, 1), self.title.as_str().into())?;
        self.sheet.merge(title_range)?;
        self.sheet
            .set_style(title_range, &Style::default().bold(true).align(Align::Center))?;

        // Spot table
        for (i, label) in SPOT_HEADERS.iter().enumerate() {
            self.sheet
                .set_value(Cell::new(SPOT_HEADER_ROW, i as u32 + 1), (*label).into())?;
        }
        self.sheet.set_style(
            CellRange::row_span(SPOT_HEADER_ROW, 1, SPOT_HEADERS.len() as u32),
            &header,
        )?;
        for index in IndexId::ALL {
            self.sheet
                .set_value(Cell::new(spot_row(index), 1), index.spot_name().into())?;
        }
        let first = spot_row(IndexId::Nifty);
        let last = spot_row(IndexId::Sensex);
        for col in SPOT_LTP_COL..SPOT_STAMP_COL {
            let format = if col == SPOT_CHANGE_COL {
                NumberFormat::Percent(2)
            } else {
                NumberFormat::Decimal(2)
            };
            self.sheet.set_style(
                CellRange::col_span(col, first, last),
                &Style::default().number_format(format),
            )?;
        }

        // Futures table
        for (i, label) in FUTURES_HEADERS.iter().enumerate() {
            self.sheet
                .set_value(Cell::new(FUTURES_HEADER_ROW, i as u32 + 1), (*label).into())?;
        }
        self.sheet.set_style(
            CellRange::row_span(FUTURES_HEADER_ROW, 1, FUTURES_HEADERS.len() as u32),
            &header,
        )?;
        for index in IndexId::ALL {
            self.sheet
                .set_value(Cell::new(futures_row(index), 1), index.underlying().into())?;
        }
        let first = futures_row(IndexId::Nifty);
        let last = futures_row(IndexId::Sensex);
        for col in FUTURES_LTP_COL..FUTURES_STAMP_COL {
            let format = match col {
                FUTURES_CHANGE_COL => NumberFormat::Percent(2),
                c if c == FUTURES_VOLUME_COL || c == FUTURES_VOLUME_COL + 1 => NumberFormat::Integer,
                c if c == FUTURES_BID_COL + 1 || c == FUTURES_BID_COL + 3 => NumberFormat::Integer,
                _ => NumberFormat::Decimal(2),
            };
            self.sheet.set_style(
                CellRange::col_span(col, first, last),
                &Style::default().number_format(format),
            )?;
        }

        // Options blocks
        for (index, base) in self.layout.row_map().clone().iter() {
            let title_row = self.layout.block_title_row(index);
            let header_row = self.layout.block_header_row(index);

            self.sheet.set_value(
                Cell::new(title_row, 1),
                format!("{} Options Chain", index.underlying()).into(),
            )?;
            self.sheet.set_value(Cell::new(title_row, STRIKE_COL - 1), "ATM".into())?;
            self.sheet.set_style(
                CellRange::row_span(title_row, 1, LAST_OPTION_COL),
                &Style::default().bold(true),
            )?;

            for field in LegField::ALL {
                let label = field.header();
                self.sheet.set_value(
                    Cell::new(header_row, leg_col(OptionType::Call, field)),
                    format!("CE {label}").into(),
                )?;
                self.sheet.set_value(
                    Cell::new(header_row, leg_col(OptionType::Put, field)),
                    format!("PE {label}").into(),
                )?;
            }
            self.sheet
                .set_value(Cell::new(header_row, STRIKE_COL), "Strike".into())?;
            self.sheet.set_style(
                CellRange::row_span(header_row, 1, LAST_OPTION_COL),
                &header,
            )?;
            self.sheet.set_style(
                CellRange::col_span(STRIKE_COL, base, base + self.layout.capacity() - 1),
                &Style::default().bold(true).align(Align::Center),
            )?;

            self.sheet
                .define_name(&chain_name(index), self.layout.chain_range(index))?;
        }

        // Widths and fonts, once
        self.sheet.set_column_width(1, 20.0)?;
        self.sheet.autofit(2, LAST_OPTION_COL)?;
        self.sheet.set_column_width(STRIKE_COL, 12.0)?;

        tracing::info!(
            target: "sheet",
            strikes_per_block = self.layout.capacity(),
            last_row = self.layout.last_row(),
            "Workbook laid out"
        );
        Ok(())
    }

    /// Write one snapshot
    ///
    /// `now` is captured once by the caller and used for every timestamp,
    /// ATM and time-to-expiry calculation in the pass.
    pub fn apply(&mut self, snapshot: &Snapshot, now: OffsetDateTime) -> PassReport {
        let mut report = PassReport::default();
        let stamp = format_stamp(now);

        self.write_spot_table(snapshot, &stamp, &mut report);
        self.write_futures_table(snapshot, &stamp, &mut report);
        for index in IndexId::ALL {
            self.write_chain(index, snapshot, now.date(), &mut report);
        }

        tracing::debug!(
            target: "sheet",
            stamp = %stamp,
            strike_rows = report.strike_rows,
            greeks = report.greeks,
            errors = report.errors,
            "Update pass complete"
        );
        report
    }

    /// Give up on a writer whose initialization failed
    ///
    /// Closes whatever the factory opened and hands the Greeks engine back
    /// for the next attempt.
    pub fn abandon(mut self) -> G {
        if let Err(e) = self.sheet.quit() {
            tracing::debug!(target: "sheet", error = %e, "Failed to close half-initialized spreadsheet");
        }
        self.greeks
    }

    /// Save the workbook and close the application
    ///
    /// Both steps are attempted; failures are logged and swallowed.
    pub fn close(mut self) {
        if let Err(e) = self.sheet.save() {
            tracing::warn!(target: "sheet", error = %e, "Failed to save workbook");
        }
        if let Err(e) = self.sheet.quit() {
            tracing::warn!(target: "sheet", error = %e, "Failed to close spreadsheet");
        }
        tracing::info!(target: "sheet", "Spreadsheet closed");
    }

    fn write_spot_table(&mut self, snapshot: &Snapshot, stamp: &str, report: &mut PassReport) {
        for index in IndexId::ALL {
            let Some(quote) = snapshot.spot(index) else {
                continue;
            };
            match self.write_spot_row(index, quote, stamp) {
                Ok(()) => report.spot_rows += 1,
                Err(e) => {
                    report.errors += 1;
                    tracing::warn!(target: "sheet", symbol = index.spot_name(), error = %e, "Skipping spot row");
                }
            }
        }
    }

    fn write_spot_row(&mut self, index: IndexId, quote: &MarketQuote, stamp: &str) -> Result<()> {
        let row = spot_row(index);
        let prices = &quote.prices;
        let last = prices.require_last_price(index.spot_name())?;
        let change = prices.effective_change_percent();

        self.sheet.set_value(Cell::new(row, SPOT_LTP_COL), last.into())?;
        self.sheet.set_value(Cell::new(row, SPOT_CHANGE_COL), change.into())?;
        self.write_ohlc(Cell::new(row, SPOT_OPEN_COL), prices)?;
        self.sheet.set_value(Cell::new(row, SPOT_STAMP_COL), stamp.into())?;

        self.sheet.set_style(
            CellRange::row_span(row, SPOT_LTP_COL, SPOT_CHANGE_COL),
            &Style::default().font_color(trend_color(change)),
        )?;
        self.sheet.set_style(
            CellRange::cell(Cell::new(row, SPOT_LTP_COL)),
            &Style::default().fill(session_fill(prices)),
        )
    }

    fn write_futures_table(&mut self, snapshot: &Snapshot, stamp: &str, report: &mut PassReport) {
        let mut front: [Option<(&str, &FuturesQuote)>; IndexId::ALL.len()] = Default::default();

        for (symbol, quote) in &snapshot.futures_data {
            let Some(index) = IndexId::from_contract_symbol(symbol) else {
                tracing::debug!(target: "sheet", symbol = %symbol, "Futures contract for untracked index");
                continue;
            };
            let slot = &mut front[index.ordinal()];
            let earlier = match slot {
                Some((current, held)) => {
                    (quote.expiry.is_none(), quote.expiry, symbol.as_str())
                        < (held.expiry.is_none(), held.expiry, *current)
                }
                None => true,
            };
            if earlier {
                *slot = Some((symbol.as_str(), quote));
            }
        }

        for index in IndexId::ALL {
            let Some((symbol, quote)) = front[index.ordinal()] else {
                continue;
            };
            match self.write_futures_row(index, symbol, quote, stamp) {
                Ok(()) => report.futures_rows += 1,
                Err(e) => {
                    report.errors += 1;
                    tracing::warn!(target: "sheet", symbol = %symbol, error = %e, "Skipping futures row");
                }
            }
        }
    }

    fn write_futures_row(
        &mut self,
        index: IndexId,
        symbol: &str,
        quote: &FuturesQuote,
        stamp: &str,
    ) -> Result<()> {
        let row = futures_row(index);
        let prices = &quote.prices;
        let depth = &quote.depth;
        let last = prices.require_last_price(symbol)?;
        let change = prices.effective_change_percent();

        self.sheet
            .set_value(Cell::new(row, FUTURES_CONTRACT_COL), symbol.into())?;
        self.sheet.set_value(Cell::new(row, FUTURES_LTP_COL), last.into())?;
        self.sheet
            .set_value(Cell::new(row, FUTURES_CHANGE_COL), change.into())?;
        self.write_ohlc(Cell::new(row, FUTURES_OPEN_COL), prices)?;

        let volume = Cell::new(row, FUTURES_VOLUME_COL);
        self.sheet.set_value(volume, depth.volume.into())?;
        self.sheet.set_value(volume.right(1), depth.oi.into())?;

        let bid = Cell::new(row, FUTURES_BID_COL);
        self.sheet.set_value(bid, depth.bid_price.into())?;
        self.sheet.set_value(bid.right(1), depth.bid_qty.into())?;
        self.sheet.set_value(bid.right(2), depth.ask_price.into())?;
        self.sheet.set_value(bid.right(3), depth.ask_qty.into())?;
        self.sheet.set_value(Cell::new(row, FUTURES_STAMP_COL), stamp.into())?;

        self.sheet.set_style(
            CellRange::row_span(row, FUTURES_LTP_COL, FUTURES_CHANGE_COL),
            &Style::default().font_color(trend_color(change)),
        )?;
        self.sheet.set_style(
            CellRange::cell(Cell::new(row, FUTURES_LTP_COL)),
            &Style::default().fill(session_fill(prices)),
        )
    }

    fn write_ohlc(&mut self, open: Cell, prices: &PriceFields) -> Result<()> {
        self.sheet.set_value(open, prices.open.into())?;
        self.sheet.set_value(open.right(1), prices.high.into())?;
        self.sheet.set_value(open.right(2), prices.low.into())?;
        self.sheet.set_value(open.right(3), prices.close.into())
    }

    fn write_chain(&mut self, index: IndexId, snapshot: &Snapshot, today: Date, report: &mut PassReport) {
        let spot = snapshot
            .spot(index)
            .and_then(|quote| quote.prices.last_price)
            .filter(|price| price.is_finite() && *price > 0.0);
        let atm = spot.map(|spot| index.atm_strike(spot));

        let atm_cell = Cell::new(self.layout.block_title_row(index), STRIKE_COL);
        let atm_value = atm.map_or(CellValue::Empty, CellValue::from);
        if let Err(e) = self.sheet.set_value(atm_cell, atm_value) {
            report.errors += 1;
            tracing::warn!(target: "sheet", index = %index, error = %e, "Failed to write ATM strike");
        }

        let ladder = StrikeLadder::build(index, &snapshot.options_data);
        if ladder.len() > self.layout.capacity() as usize {
            tracing::warn!(
                target: "sheet",
                index = %index,
                strikes = ladder.len(),
                capacity = self.layout.capacity(),
                "Strike ladder exceeds block capacity, keeping lowest strikes"
            );
        }

        let mut written = 0u32;
        for (rank, strike, row) in ladder.iter() {
            let Some(sheet_row) = self.layout.strike_row(index, rank) else {
                break;
            };
            written += 1;
            report.strike_rows += 1;
            self.write_strike_row(sheet_row, strike, row, spot, atm, today, report);
        }

        let previous = self.rendered[index.ordinal()];
        for rank in written..previous {
            let row = self.layout.row_map().base_row(index) + rank;
            if let Err(e) = self.clear_row(row) {
                report.errors += 1;
                tracing::warn!(target: "sheet", index = %index, row, error = %e, "Failed to clear stale strike row");
            }
        }
        self.rendered[index.ordinal()] = written;

        if written > 0 {
            if let Err(e) = self.format_chain(index, written) {
                report.errors += 1;
                tracing::warn!(target: "sheet", index = %index, error = %e, "Failed to format options block");
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn write_strike_row(
        &mut self,
        row: u32,
        strike: f64,
        legs: &StrikeRow<'_>,
        spot: Option<f64>,
        atm: Option<f64>,
        today: Date,
        report: &mut PassReport,
    ) {
        if let Err(e) = self.sheet.set_value(Cell::new(row, STRIKE_COL), strike.into()) {
            report.errors += 1;
            tracing::warn!(target: "sheet", strike, error = %e, "Failed to write strike");
        }

        for side in [OptionType::Call, OptionType::Put] {
            let outcome = match legs.leg(side) {
                Some(leg) => {
                    report.legs += 1;
                    self.write_leg(row, side, strike, leg, spot, today, report)
                }
                None => self.clear_side(row, side),
            };
            if let Err(e) = outcome {
                report.errors += 1;
                let symbol = legs.leg(side).map_or("", |leg| leg.symbol);
                tracing::warn!(target: "sheet", symbol, strike, side = %side, error = %e, "Skipping option leg");
            }
        }

        let highlight = if is_atm(strike, atm) {
            Style::default()
                .bold(true)
                .fill(Fill::Solid(Color::ATM_YELLOW))
        } else {
            Style::default().bold(false).fill(Fill::None)
        };
        if let Err(e) = self
            .sheet
            .set_style(CellRange::row_span(row, 1, LAST_OPTION_COL), &highlight)
        {
            report.errors += 1;
            tracing::warn!(target: "sheet", strike, error = %e, "Failed to highlight strike row");
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn write_leg(
        &mut self,
        row: u32,
        side: OptionType,
        strike: f64,
        leg: Leg<'_>,
        spot: Option<f64>,
        today: Date,
        report: &mut PassReport,
    ) -> Result<()> {
        let last = match self.write_quote_fields(row, side, leg) {
            Ok(last) => last,
            Err(e) => {
                // The row may hold another strike's leg from the previous pass
                self.clear_side_best_effort(row, side);
                return Err(e);
            }
        };

        let greeks = spot
            .ok_or_else(|| FeedError::Greeks("no spot price for underlying".to_string()))
            .and_then(|spot| {
                let expiry = leg.quote.require_expiry(leg.symbol)?;
                let tte = time_to_expiry(expiry, today);
                self.greeks.leg_greeks(spot, strike, tte, last, side)
            })
            .and_then(|greeks| {
                let values = [
                    (LegField::Iv, greeks.iv),
                    (LegField::Delta, greeks.delta),
                    (LegField::Gamma, greeks.gamma),
                    (LegField::Theta, greeks.theta),
                    (LegField::Vega, greeks.vega),
                ];
                for (field, value) in values {
                    self.sheet.set_value(leg_cell(row, side, field), value.into())?;
                }
                Ok(())
            });

        match greeks {
            Ok(()) => {
                report.greeks += 1;
                Ok(())
            }
            Err(e) => {
                // Raw fields stay; stale Greeks from an earlier pass do not
                for field in LegField::ALL.into_iter().filter(|f| f.is_greek()) {
                    self.sheet.set_value(leg_cell(row, side, field), CellValue::Empty)?;
                }
                Err(e)
            }
        }
    }

    /// Write the twelve market fields of a leg, returning its last price
    fn write_quote_fields(&mut self, row: u32, side: OptionType, leg: Leg<'_>) -> Result<f64> {
        let prices = &leg.quote.prices;
        let depth = &leg.quote.depth;
        let last = prices.require_last_price(leg.symbol)?;

        let raw: [(LegField, CellValue); 12] = [
            (LegField::Ltp, last.into()),
            (LegField::ChangePct, prices.effective_change_percent().into()),
            (LegField::Open, prices.open.into()),
            (LegField::High, prices.high.into()),
            (LegField::Low, prices.low.into()),
            (LegField::Close, prices.close.into()),
            (LegField::Volume, depth.volume.into()),
            (LegField::Oi, depth.oi.into()),
            (LegField::BidQty, depth.bid_qty.into()),
            (LegField::Bid, depth.bid_price.into()),
            (LegField::Ask, depth.ask_price.into()),
            (LegField::AskQty, depth.ask_qty.into()),
        ];
        for (field, value) in raw {
            self.sheet.set_value(leg_cell(row, side, field), value)?;
        }
        Ok(last)
    }

    /// Blank every cell of one side, carrying on past cells that fail
    fn clear_side_best_effort(&mut self, row: u32, side: OptionType) {
        for field in LegField::ALL {
            if let Err(e) = self.sheet.set_value(leg_cell(row, side, field), CellValue::Empty) {
                tracing::debug!(target: "sheet", row, side = %side, field = field.header(), error = %e, "Failed to clear leg cell");
            }
        }
    }

    fn clear_side(&mut self, row: u32, side: OptionType) -> Result<()> {
        for field in LegField::ALL {
            self.sheet.set_value(leg_cell(row, side, field), CellValue::Empty)?;
        }
        Ok(())
    }

    fn clear_row(&mut self, row: u32) -> Result<()> {
        for col in 1..=LAST_OPTION_COL {
            self.sheet.set_value(Cell::new(row, col), CellValue::Empty)?;
        }
        self.sheet.set_style(
            CellRange::row_span(row, 1, LAST_OPTION_COL),
            &Style::default().bold(false).fill(Fill::None),
        )
    }

    fn format_chain(&mut self, index: IndexId, rows: u32) -> Result<()> {
        let first = self.layout.row_map().base_row(index);
        let last = first + rows - 1;
        for side in [OptionType::Call, OptionType::Put] {
            for field in LegField::ALL {
                self.sheet.set_style(
                    CellRange::col_span(leg_col(side, field), first, last),
                    &Style::default().number_format(field.number_format()),
                )?;
            }
        }
        Ok(())
    }
}

/// Font colour for a percent change
#[inline]
fn trend_color(change_percent: f64) -> Color {
    if change_percent >= 0.0 {
        Color::GREEN
    } else {
        Color::RED
    }
}

/// Background comparing close against open
#[inline]
fn session_fill(prices: &PriceFields) -> Fill {
    if prices.open == 0.0 && prices.close == 0.0 {
        Fill::None
    } else if prices.close >= prices.open {
        Fill::Solid(Color::LIGHT_GREEN)
    } else {
        Fill::Solid(Color::LIGHT_RED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::OptionQuote;
    use crate::greeks::Greeks;
    use crate::layout::OPTIONS_START_ROW;
    use crate::sheet::MemorySheet;
    use crate::test_utils::{futures_quote, nifty_snapshot, option_leg, test_expiry, test_now};
    use std::cell::RefCell;

    fn writer_with(sheet: &MemorySheet, strikes: u32) -> SheetWriter<MemorySheet, RecordingGreeks> {
        let mut writer = SheetWriter::new(
            sheet.clone(),
            RecordingGreeks::default(),
            SheetLayout::new(strikes),
            "Live Market Monitor",
        );
        writer.initialize().unwrap();
        writer
    }

    fn writer(sheet: &MemorySheet) -> SheetWriter<MemorySheet, RecordingGreeks> {
        writer_with(sheet, 21)
    }

    const NIFTY_BASE: u32 = OPTIONS_START_ROW + 2;

    /// Records every Greeks request
    #[derive(Default)]
    struct RecordingGreeks {
        calls: RefCell<Vec<(f64, f64, f64, f64, OptionType)>>,
    }

    impl GreeksEngine for RecordingGreeks {
        fn estimate_implied_volatility(
            &self,
            spot: f64,
            strike: f64,
            time_to_expiry: f64,
            market_price: f64,
            option_type: OptionType,
        ) -> Result<f64> {
            self.calls
                .borrow_mut()
                .push((spot, strike, time_to_expiry, market_price, option_type));
            Ok(20.0)
        }

        fn compute_greeks(
            &self,
            _spot: f64,
            _strike: f64,
            _time_to_expiry: f64,
            _volatility: f64,
            _option_type: OptionType,
        ) -> Result<Greeks> {
            Ok(Greeks {
                delta: 0.5,
                gamma: 0.001,
                theta: -10.0,
                vega: 12.0,
            })
        }
    }

    #[test]
    fn test_initialize_lays_out_blocks() {
        let sheet = MemorySheet::new();
        let _writer = writer(&sheet);

        assert_eq!(sheet.workbook_count(), 1);
        assert_eq!(
            sheet.value_at(Cell::new(TITLE_ROW, 1)),
            CellValue::from("Live Market Monitor")
        );
        assert_eq!(
            sheet.value_at(Cell::new(SPOT_HEADER_ROW, 2)),
            CellValue::from(SPOT_HEADERS[1])
        );
        assert_eq!(
            sheet.value_at(Cell::new(spot_row(IndexId::BankNifty), 1)),
            CellValue::from("NIFTY BANK")
        );
        assert_eq!(
            sheet.value_at(Cell::new(NIFTY_BASE - 1, STRIKE_COL)),
            CellValue::from("Strike")
        );
        assert_eq!(
            sheet.named_range("CHAIN_NIFTY").map(|r| r.start.row),
            Some(NIFTY_BASE)
        );
        assert!(sheet.merges().contains(&CellRange::row_span(TITLE_ROW, 1, LAST_OPTION_COL)));
        assert_eq!(sheet.column_width(1), Some(20.0));
    }

    #[test]
    fn test_strikes_map_to_contiguous_rows() {
        let sheet = MemorySheet::new();
        let mut writer = writer(&sheet);
        let report = writer.apply(&nifty_snapshot(24037.0), test_now());

        assert_eq!(report.errors, 0);
        assert_eq!(report.strike_rows, 3);
        assert_eq!(report.legs, 6);
        for (offset, strike) in [24000.0, 24050.0, 24100.0].into_iter().enumerate() {
            assert_eq!(
                sheet.value_at(Cell::new(NIFTY_BASE + offset as u32, STRIKE_COL)),
                CellValue::Number(strike)
            );
        }
        // 24100 call LTP = 120, put LTP = 80
        let row = NIFTY_BASE + 2;
        assert_eq!(
            sheet.value_at(leg_cell(row, OptionType::Call, LegField::Ltp)),
            CellValue::Number(120.0)
        );
        assert_eq!(
            sheet.value_at(leg_cell(row, OptionType::Put, LegField::Ltp)),
            CellValue::Number(80.0)
        );
        assert_eq!(
            sheet.value_at(leg_cell(row, OptionType::Put, LegField::Oi)),
            CellValue::Number(50_000.0)
        );
    }

    #[test]
    fn test_atm_row_highlighted() {
        let sheet = MemorySheet::new();
        let mut writer = writer(&sheet);
        // 24037 rounds to 24050
        writer.apply(&nifty_snapshot(24037.0), test_now());

        let title_row = NIFTY_BASE - 2;
        assert_eq!(
            sheet.value_at(Cell::new(title_row, STRIKE_COL)),
            CellValue::Number(24050.0)
        );
        let atm = sheet.style_at(Cell::new(NIFTY_BASE + 1, STRIKE_COL));
        assert_eq!(atm.bold, Some(true));
        assert_eq!(atm.fill, Some(Fill::Solid(Color::ATM_YELLOW)));
        let other = sheet.style_at(Cell::new(NIFTY_BASE, 5));
        assert_eq!(other.bold, Some(false));
        assert_eq!(other.fill, Some(Fill::None));

        // Spot moves: highlight follows
        writer.apply(&nifty_snapshot(24090.0), test_now());
        assert_eq!(
            sheet.style_at(Cell::new(NIFTY_BASE + 1, STRIKE_COL)).bold,
            Some(false)
        );
        assert_eq!(
            sheet.style_at(Cell::new(NIFTY_BASE + 2, STRIKE_COL)).bold,
            Some(true)
        );
    }

    #[test]
    fn test_greeks_called_once_per_leg() {
        let sheet = MemorySheet::new();
        let mut writer = writer(&sheet);
        let report = writer.apply(&nifty_snapshot(24037.0), test_now());

        assert_eq!(report.greeks, 6);
        let calls = writer.greeks.calls.borrow();
        assert_eq!(calls.len(), 6);
        for (spot, _, tte, _, _) in calls.iter() {
            assert_eq!(*spot, 24037.0);
            assert!((tte - 7.0 / 365.0).abs() < 1e-12);
        }
        assert!(calls
            .iter()
            .any(|c| c.1 == 24000.0 && c.3 == 40.0 && c.4 == OptionType::Put));

        let row = NIFTY_BASE;
        assert_eq!(
            sheet.value_at(leg_cell(row, OptionType::Call, LegField::Iv)),
            CellValue::Number(20.0)
        );
        assert_eq!(
            sheet.value_at(leg_cell(row, OptionType::Put, LegField::Theta)),
            CellValue::Number(-10.0)
        );
    }

    #[test]
    fn test_spot_row_values_and_colors() {
        let sheet = MemorySheet::new();
        let mut writer = writer(&sheet);
        let mut snapshot = nifty_snapshot(24137.0);
        snapshot.market_data.insert(
            "NIFTY BANK".to_string(),
            MarketQuote {
                prices: PriceFields {
                    last_price: Some(51210.0),
                    change: Some(-200.0),
                    open: 51500.0,
                    close: 51210.0,
                    ..PriceFields::default()
                },
            },
        );
        let report = writer.apply(&snapshot, test_now());
        assert_eq!(report.spot_rows, 2);

        let nifty = spot_row(IndexId::Nifty);
        assert_eq!(sheet.value_at(Cell::new(nifty, SPOT_LTP_COL)), CellValue::Number(24137.0));
        assert_eq!(sheet.value_at(Cell::new(nifty, SPOT_CHANGE_COL)), CellValue::Number(0.6));
        assert_eq!(
            sheet.value_at(Cell::new(nifty, SPOT_STAMP_COL)),
            CellValue::from("10:00:00")
        );
        let style = sheet.style_at(Cell::new(nifty, SPOT_LTP_COL));
        assert_eq!(style.font_color, Some(Color::GREEN));
        assert_eq!(style.fill, Some(Fill::Solid(Color::LIGHT_GREEN)));

        let bank = spot_row(IndexId::BankNifty);
        let change = sheet
            .value_at(Cell::new(bank, SPOT_CHANGE_COL))
            .as_number()
            .unwrap();
        assert!((change - (-200.0 / 51410.0 * 100.0)).abs() < 1e-9);
        let style = sheet.style_at(Cell::new(bank, SPOT_LTP_COL));
        assert_eq!(style.font_color, Some(Color::RED));
        assert_eq!(style.fill, Some(Fill::Solid(Color::LIGHT_RED)));
    }

    #[test]
    fn test_front_month_futures_written() {
        let sheet = MemorySheet::new();
        let mut writer = writer(&sheet);
        let mut snapshot = nifty_snapshot(24137.0);
        let mut next_month = futures_quote(24300.0);
        next_month.expiry = Some(test_expiry() + time::Duration::days(28));
        snapshot
            .futures_data
            .insert("NIFTY25JANFUT".to_string(), next_month);

        let report = writer.apply(&snapshot, test_now());
        assert_eq!(report.futures_rows, 1);
        let row = futures_row(IndexId::Nifty);
        assert_eq!(
            sheet.value_at(Cell::new(row, FUTURES_CONTRACT_COL)),
            CellValue::from("NIFTY24DECFUT")
        );
        assert_eq!(sheet.value_at(Cell::new(row, FUTURES_LTP_COL)), CellValue::Number(24182.0));
        assert_eq!(
            sheet.value_at(Cell::new(row, FUTURES_VOLUME_COL)),
            CellValue::Number(250_000.0)
        );
        assert_eq!(
            sheet.value_at(Cell::new(row, FUTURES_BID_COL + 3)),
            CellValue::Number(450.0)
        );
    }

    #[test]
    fn test_leg_missing_price_does_not_block_others() {
        let sheet = MemorySheet::new();
        let mut writer = writer(&sheet);
        let mut snapshot = nifty_snapshot(24037.0);
        let mut broken = OptionQuote::new("NIFTY", 24050.0, OptionType::Call);
        broken.expiry = Some(test_expiry());
        snapshot.options_data.insert("NIFTY24050CE".to_string(), broken);

        let report = writer.apply(&snapshot, test_now());
        assert_eq!(report.errors, 1);
        assert_eq!(report.legs, 6);
        assert_eq!(report.greeks, 5);

        let row = NIFTY_BASE + 1;
        assert!(sheet
            .value_at(leg_cell(row, OptionType::Call, LegField::Ltp))
            .is_empty());
        assert_eq!(
            sheet.value_at(leg_cell(row, OptionType::Put, LegField::Ltp)),
            CellValue::Number(60.0)
        );
        assert_eq!(
            sheet.value_at(leg_cell(NIFTY_BASE + 2, OptionType::Call, LegField::Ltp)),
            CellValue::Number(120.0)
        );
    }

    #[test]
    fn test_failed_leg_after_ladder_shift_leaves_no_stale_values() {
        let sheet = MemorySheet::new();
        let mut writer = writer(&sheet);
        writer.apply(&nifty_snapshot(24037.0), test_now());
        assert_eq!(
            sheet.value_at(leg_cell(NIFTY_BASE, OptionType::Call, LegField::Ltp)),
            CellValue::Number(190.0)
        );

        // 24000 leaves, 24150 arrives: 24050 moves up into the first row
        let mut shifted = nifty_snapshot(24037.0);
        shifted.options_data.retain(|_, quote| quote.strike > 24000.0);
        for side in [OptionType::Call, OptionType::Put] {
            let (sym, quote) = option_leg("NIFTY", 24150.0, side, 30.0);
            shifted.options_data.insert(sym, quote);
        }
        if let Some(call) = shifted.options_data.get_mut("NIFTY24050CE") {
            call.prices.last_price = None;
        }

        let report = writer.apply(&shifted, test_now());
        assert_eq!(report.errors, 1);
        assert_eq!(
            sheet.value_at(Cell::new(NIFTY_BASE, STRIKE_COL)),
            CellValue::Number(24050.0)
        );
        for field in LegField::ALL {
            assert!(
                sheet.value_at(leg_cell(NIFTY_BASE, OptionType::Call, field)).is_empty(),
                "{field:?} kept the previous strike's value"
            );
        }
        assert_eq!(
            sheet.value_at(leg_cell(NIFTY_BASE, OptionType::Put, LegField::Ltp)),
            CellValue::Number(60.0)
        );
    }

    #[test]
    fn test_failed_cell_write_blanks_rest_of_leg() {
        let sheet = MemorySheet::new();
        let mut writer = writer(&sheet);
        writer.apply(&nifty_snapshot(24037.0), test_now());

        sheet.inject_cell_failure(leg_cell(NIFTY_BASE, OptionType::Call, LegField::Open));
        let mut changed = nifty_snapshot(24037.0);
        if let Some(call) = changed.options_data.get_mut("NIFTY24000CE") {
            call.prices.last_price = Some(175.0);
        }
        let report = writer.apply(&changed, test_now());

        assert_eq!(report.errors, 1);
        assert!(sheet
            .value_at(leg_cell(NIFTY_BASE, OptionType::Call, LegField::Oi))
            .is_empty());
        assert!(sheet
            .value_at(leg_cell(NIFTY_BASE, OptionType::Call, LegField::Delta))
            .is_empty());
    }

    #[test]
    fn test_missing_spot_keeps_raw_fields() {
        let sheet = MemorySheet::new();
        let mut writer = writer(&sheet);
        let mut snapshot = nifty_snapshot(24037.0);
        snapshot.market_data.clear();

        let report = writer.apply(&snapshot, test_now());
        assert_eq!(report.greeks, 0);
        assert_eq!(report.errors, 6);
        assert_eq!(
            sheet.value_at(leg_cell(NIFTY_BASE, OptionType::Call, LegField::Ltp)),
            CellValue::Number(190.0)
        );
        assert!(sheet
            .value_at(leg_cell(NIFTY_BASE, OptionType::Call, LegField::Delta))
            .is_empty());
        assert!(sheet
            .value_at(Cell::new(NIFTY_BASE - 2, STRIKE_COL))
            .is_empty());
    }

    #[test]
    fn test_cell_failure_is_isolated() {
        let sheet = MemorySheet::new();
        let mut writer = writer(&sheet);
        sheet.inject_cell_failure(leg_cell(NIFTY_BASE, OptionType::Put, LegField::Ltp));

        let report = writer.apply(&nifty_snapshot(24037.0), test_now());
        assert_eq!(report.errors, 1);
        assert_eq!(
            sheet.value_at(leg_cell(NIFTY_BASE, OptionType::Call, LegField::Ltp)),
            CellValue::Number(190.0)
        );
        assert_eq!(
            sheet.value_at(leg_cell(NIFTY_BASE + 1, OptionType::Put, LegField::Ltp)),
            CellValue::Number(60.0)
        );
    }

    #[test]
    fn test_shrinking_ladder_clears_stale_rows() {
        let sheet = MemorySheet::new();
        let mut writer = writer(&sheet);
        writer.apply(&nifty_snapshot(24037.0), test_now());

        let mut smaller = nifty_snapshot(24037.0);
        smaller.options_data.retain(|_, quote| quote.strike < 24100.0);
        writer.apply(&smaller, test_now());

        assert_eq!(
            sheet.value_at(Cell::new(NIFTY_BASE + 1, STRIKE_COL)),
            CellValue::Number(24050.0)
        );
        assert!(sheet.value_at(Cell::new(NIFTY_BASE + 2, STRIKE_COL)).is_empty());
        assert!(sheet
            .value_at(leg_cell(NIFTY_BASE + 2, OptionType::Call, LegField::Ltp))
            .is_empty());
    }

    #[test]
    fn test_ladder_beyond_capacity_keeps_lowest() {
        let sheet = MemorySheet::new();
        let mut writer = writer_with(&sheet, 2);
        let report = writer.apply(&nifty_snapshot(24037.0), test_now());

        assert_eq!(report.strike_rows, 2);
        assert_eq!(
            sheet.value_at(Cell::new(NIFTY_BASE + 1, STRIKE_COL)),
            CellValue::Number(24050.0)
        );
        // First row of the next block is untouched by NIFTY strikes
        assert!(sheet
            .value_at(Cell::new(NIFTY_BASE + 2, STRIKE_COL))
            .is_empty());
    }

    #[test]
    fn test_identical_snapshots_identical_cells() {
        let sheet = MemorySheet::new();
        let mut writer = writer(&sheet);
        let snapshot = nifty_snapshot(24037.0);

        writer.apply(&snapshot, test_now());
        let first = sheet.values();
        writer.apply(&snapshot, test_now());
        assert_eq!(sheet.values(), first);
    }

    #[test]
    fn test_number_formats_applied() {
        let sheet = MemorySheet::new();
        let mut writer = writer(&sheet);
        writer.apply(&nifty_snapshot(24037.0), test_now());

        let gamma = sheet.style_at(leg_cell(NIFTY_BASE, OptionType::Call, LegField::Gamma));
        assert_eq!(gamma.number_format, Some(NumberFormat::Decimal(6)));
        let iv = sheet.style_at(leg_cell(NIFTY_BASE, OptionType::Put, LegField::Iv));
        assert_eq!(iv.number_format, Some(NumberFormat::Percent(2)));
    }

    #[test]
    fn test_close_saves_then_quits() {
        let sheet = MemorySheet::new();
        let writer = writer(&sheet);
        writer.close();
        assert_eq!(sheet.save_count(), 1);
        assert_eq!(sheet.quit_count(), 1);
    }

    #[test]
    fn test_close_swallows_save_failure() {
        let sheet = MemorySheet::new();
        let writer = writer(&sheet);
        sheet.inject_save_failure();
        writer.close();
        assert_eq!(sheet.save_count(), 1);
        assert_eq!(sheet.quit_count(), 1);
    }

    #[test]
    fn test_other_index_legs_ignored_by_nifty_block() {
        let sheet = MemorySheet::new();
        let mut writer = writer(&sheet);
        let mut snapshot = nifty_snapshot(24037.0);
        let (sym, quote) = option_leg("BANKNIFTY", 51200.0, OptionType::Call, 300.0);
        snapshot.options_data.insert(sym, quote);

        let report = writer.apply(&snapshot, test_now());
        assert_eq!(report.strike_rows, 4);
        let bank_base = writer.layout().row_map().base_row(IndexId::BankNifty);
        assert_eq!(
            sheet.value_at(Cell::new(bank_base, STRIKE_COL)),
            CellValue::Number(51200.0)
        );
    }
}
