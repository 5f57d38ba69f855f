use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::Datelike;
use unicode_width::UnicodeWidthStr;

use crate::aggregate::{AnnotationSource, EventAnnotation};
use crate::config::Config;
use crate::grid::{DAYS_PER_WEEK, MonthGrid};
use crate::hijri::{self, GregorianDate, HijriDate, Locale};

const CELL_WIDTH: usize = 4;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
    locale: Locale,
}

impl Renderer {
    pub fn new(locale: Locale, color: bool) -> Self {
        Self { color, locale }
    }

    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        let color = match cfg.calendar.color.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            "auto" => io::stdout().is_terminal(),
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self::new(cfg.locale(), color))
    }

    #[tracing::instrument(skip(self, out, grid), fields(view = %grid.view))]
    pub fn write_grid<W: Write>(&self, out: &mut W, grid: &MonthGrid) -> anyhow::Result<()> {
        let row_width = CELL_WIDTH * DAYS_PER_WEEK as usize;
        writeln!(out, "{}", center(&grid.title(), row_width))?;

        let header = grid
            .week_start
            .columns()
            .iter()
            .map(|wd| pad_right(hijri::weekday_label(*wd, self.locale), CELL_WIDTH))
            .collect::<String>();
        writeln!(out, "{}", header.trim_end())?;

        let mut line = " ".repeat(CELL_WIDTH * grid.offset as usize);
        let mut current_row = 0;
        for cell in &grid.cells {
            if cell.row != current_row {
                writeln!(out, "{}", line.trim_end())?;
                line.clear();
                current_row = cell.row;
            }

            let lead = if cell.is_today { '>' } else { ' ' };
            let mark = if cell.is_annotated() { '*' } else { ' ' };
            let text = format!("{lead}{:>2}{mark}", cell.day);
            if cell.is_today {
                line.push_str(&self.paint(&text, "7"));
            } else {
                line.push_str(&text);
            }
        }
        if !line.trim().is_empty() {
            writeln!(out, "{}", line.trim_end())?;
        }

        Ok(())
    }

    pub fn write_annotation_list<W: Write>(
        &self,
        out: &mut W,
        grid: &MonthGrid,
    ) -> anyhow::Result<()> {
        let annotated: Vec<_> = grid.cells.iter().filter(|c| c.is_annotated()).collect();
        if annotated.is_empty() {
            return Ok(());
        }

        writeln!(out)?;
        for cell in annotated {
            let labels = cell
                .annotations
                .iter()
                .map(|a| self.describe(a))
                .collect::<Vec<_>>()
                .join(", ");
            let day = format!("{:>2}", cell.day);
            let day = if cell.is_today {
                self.paint(&day, "7")
            } else {
                day
            };
            writeln!(out, "{day}  {labels}")?;
        }

        Ok(())
    }

    pub fn write_dates<W: Write>(
        &self,
        out: &mut W,
        gregorian: GregorianDate,
        hijri: HijriDate,
    ) -> anyhow::Result<()> {
        writeln!(
            out,
            "gregorian  {} ({})",
            gregorian.format("%Y-%m-%d"),
            gregorian.weekday()
        )?;
        writeln!(
            out,
            "hijri      {} ({} {} {} AH)",
            hijri,
            hijri.day(),
            hijri.month_name(self.locale),
            hijri.year()
        )?;
        Ok(())
    }

    fn describe(&self, annotation: &EventAnnotation) -> String {
        match annotation.source {
            AnnotationSource::Remote => self.paint(&annotation.label, "36"),
            AnnotationSource::Observance => self.paint(&annotation.label, "33"),
            AnnotationSource::LunarPhaseApprox => format!("{} (approx.)", annotation.label),
        }
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if self.color {
            format!("\x1b[{code}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }
}

fn pad_right(text: &str, width: usize) -> String {
    let w = UnicodeWidthStr::width(text);
    if w >= width {
        format!("{text} ")
    } else {
        format!("{text}{}", " ".repeat(width - w))
    }
}

fn center(text: &str, width: usize) -> String {
    let w = UnicodeWidthStr::width(text);
    if w >= width {
        return text.to_string();
    }
    format!("{}{text}", " ".repeat((width - w) / 2))
}
