use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{Context, anyhow};
use chrono::NaiveDate;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, info, instrument, warn};

use crate::cli::{self, BrowseInput, Command, MonthArg};
use crate::config::Config;
use crate::datetime::{SystemToday, Today};
use crate::grid::{CalendarViewState, MonthGridBuilder};
use crate::hijri::{self, HijriDate};
use crate::loader::{LoadOutcome, MonthLoader};
use crate::render::Renderer;

pub fn builder_from_config(cfg: &Config, today: Arc<dyn Today>) -> anyhow::Result<MonthGridBuilder> {
    let aggregator = cfg.build_aggregator()?;
    Ok(MonthGridBuilder::new(Arc::new(aggregator), today)
        .with_locale(cfg.locale())
        .with_week_start(cfg.week_start()))
}

#[instrument(skip(cfg, renderer, command))]
pub async fn dispatch(cfg: &Config, renderer: &Renderer, command: Command) -> anyhow::Result<()> {
    let today: Arc<dyn Today> = Arc::new(SystemToday::new(cfg.timezone()));
    let builder = builder_from_config(cfg, today)?;

    debug!(
        command = ?command,
        remote = builder.aggregator().has_remote(),
        "dispatching command"
    );

    let mut out = io::stdout().lock();
    match command {
        Command::Month { month } => cmd_month(&builder, renderer, month, &mut out).await,
        Command::Today => cmd_today(&builder, renderer, &mut out).await,
        Command::Convert { date, hijri } => cmd_convert(renderer, &date, hijri, &mut out),
        Command::Browse { month } => {
            drop(out);
            let start = resolve_view(&builder, month)?;
            let input = BufReader::new(tokio::io::stdin());
            browse(&builder, renderer, start, input, io::stdout()).await
        }
    }
}

fn resolve_view(builder: &MonthGridBuilder, month: Option<MonthArg>) -> anyhow::Result<CalendarViewState> {
    match month {
        Some(MonthArg(view)) => Ok(view),
        None => builder
            .current_view()
            .context("today is outside the supported hijri range"),
    }
}

pub async fn cmd_month<W: Write>(
    builder: &MonthGridBuilder,
    renderer: &Renderer,
    month: Option<MonthArg>,
    out: &mut W,
) -> anyhow::Result<()> {
    let view = resolve_view(builder, month)?;
    let grid = builder
        .build_grid(view.year(), view.month())
        .await
        .with_context(|| format!("failed to build grid for {view}"))?;

    renderer.write_grid(out, &grid)?;
    renderer.write_annotation_list(out, &grid)?;
    info!(view = %view, annotated = grid.cells.iter().filter(|c| c.is_annotated()).count(), "rendered month");
    Ok(())
}

pub async fn cmd_today<W: Write>(builder: &MonthGridBuilder, renderer: &Renderer, out: &mut W) -> anyhow::Result<()> {
    let gregorian = builder.today();
    let hijri = hijri::to_hijri(gregorian).context("today is outside the supported hijri range")?;
    renderer.write_dates(out, gregorian, hijri)?;

    let grid = builder.build_grid(hijri.year(), hijri.month()).await?;
    if let Some(cell) = grid.today()
        && cell.is_annotated()
    {
        writeln!(out)?;
        for annotation in &cell.annotations {
            if annotation.is_approximate() {
                writeln!(out, "{} (approx.)", annotation.label)?;
            } else {
                writeln!(out, "{}", annotation.label)?;
            }
        }
    }

    Ok(())
}

pub fn cmd_convert<W: Write>(renderer: &Renderer, raw: &str, from_hijri: bool, out: &mut W) -> anyhow::Result<()> {
    let raw = raw.trim();
    let (gregorian, hijri) = if from_hijri {
        let hijri: HijriDate = raw.parse()?;
        (hijri.to_gregorian(), hijri)
    } else {
        let gregorian = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|e| anyhow!("expected gregorian date as YYYY-MM-DD, got {raw}: {e}"))?;
        let hijri = hijri::to_hijri(gregorian).with_context(|| format!("cannot convert {raw}"))?;
        (gregorian, hijri)
    };

    debug!(%gregorian, %hijri, from_hijri, "converted date");
    renderer.write_dates(out, gregorian, hijri)
}

/// Interactive month browser.
///
/// Each view is printed from the offline sources right away. When a
/// remote source is configured the enriched grid follows once the
/// loader delivers it, unless the user has already moved on.
#[instrument(skip(builder, renderer, start, input, out), fields(start = %start))]
pub async fn browse<R, W>(
    builder: &MonthGridBuilder,
    renderer: &Renderer,
    start: CalendarViewState,
    input: R,
    mut out: W,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let live = builder.aggregator().has_remote();
    let mut loader = MonthLoader::new(Arc::clone(builder.aggregator()));
    let mut lines = input.lines();
    let mut view = start;

    show_offline(builder, renderer, view, &mut out)?;
    if live {
        loader.request(view);
    }

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read browse input")? else {
                    debug!("browse input closed");
                    break;
                };

                let next = match cli::parse_browse_input(&line) {
                    Some(BrowseInput::Quit) => break,
                    Some(BrowseInput::Navigate(direction)) => view.navigate(direction),
                    Some(BrowseInput::Today) => builder
                        .current_view()
                        .context("today is outside the supported hijri range")?,
                    None => {
                        if !line.trim().is_empty() {
                            writeln!(out, "commands: n(ext), p(rev), t(oday), q(uit)")?;
                        }
                        continue;
                    }
                };

                if next == view {
                    debug!(view = %view, "view unchanged");
                }
                view = next;
                show_offline(builder, renderer, view, &mut out)?;
                if live {
                    loader.request(view);
                }
            }
            Some(outcome) = loader.next_outcome(), if live => {
                match outcome {
                    LoadOutcome::Applied { generation, view: loaded, result } => match result {
                        Ok(annotations) => {
                            let grid = builder.layout(loaded, &annotations, builder.today())?;
                            debug!(generation, view = %loaded, "applying remote annotations");
                            writeln!(out)?;
                            renderer.write_grid(&mut out, &grid)?;
                            renderer.write_annotation_list(&mut out, &grid)?;
                            out.flush()?;
                        }
                        Err(err) => {
                            warn!(generation, view = %loaded, error = %err, "annotation load failed");
                        }
                    },
                    LoadOutcome::Stale { .. } => {}
                }
            }
        }
    }

    Ok(())
}

fn show_offline<W: Write>(
    builder: &MonthGridBuilder,
    renderer: &Renderer,
    view: CalendarViewState,
    out: &mut W,
) -> anyhow::Result<()> {
    let grid = builder.build_offline_grid(view.year(), view.month())?;
    writeln!(out)?;
    renderer.write_grid(out, &grid)?;
    renderer.write_annotation_list(out, &grid)?;
    out.flush()?;
    Ok(())
}
