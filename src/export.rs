// 📤 Export - CSV snapshots of derived views

use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;

use crate::derive::{CardValues, ParameterCard};
use crate::heatmap::HeatmapMatrix;

/// Write the heatmap as `parameter,<year>,<year>...`.
///
/// Missing cells are written empty rather than as the zero the color scale
/// uses, so the CSV keeps "no data" distinct from "no change".
pub fn write_heatmap_csv<W: Write>(writer: W, matrix: &HeatmapMatrix) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);

    let mut header = vec!["parameter".to_string(), "label".to_string()];
    header.extend(matrix.years.iter().cloned());
    wtr.write_record(&header)?;

    for (row, cells) in matrix.cells.iter().enumerate() {
        let mut record = vec![matrix.row_keys[row].clone(), matrix.row_labels[row].clone()];
        record.extend(cells.iter().map(|cell| {
            if cell.present {
                cell.value.to_string()
            } else {
                String::new()
            }
        }));
        wtr.write_record(&record)?;
    }

    wtr.flush()?;
    Ok(())
}

pub fn export_heatmap(path: &Path, matrix: &HeatmapMatrix) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {:?}", path))?;
    write_heatmap_csv(file, matrix)
        .with_context(|| format!("Failed to write heatmap to {:?}", path))
}

/// Write one row per card: key, label, category, year, old, new, change
pub fn write_cards_csv<W: Write>(writer: W, cards: &[ParameterCard]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(["parameter", "label", "category", "year", "old", "new", "change"])?;

    for card in cards {
        let (old, new, change) = match &card.values {
            CardValues::Compared {
                old_text,
                new_text,
                badge,
            } => (
                old_text.as_str(),
                new_text.as_str(),
                badge.as_ref().map(|b| b.text.as_str()).unwrap_or(""),
            ),
            CardValues::NewOnly { new_text } => ("", new_text.as_str(), ""),
            CardValues::Empty => ("", "", ""),
        };

        wtr.write_record([
            card.key.as_str(),
            card.label.as_str(),
            card.category.as_str(),
            card.year.as_deref().unwrap_or(""),
            old,
            new,
            change,
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

pub fn export_cards(path: &Path, cards: &[ParameterCard]) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {:?}", path))?;
    write_cards_csv(file, cards)
        .with_context(|| format!("Failed to write cards to {:?}", path))
}
