// Pagination & counting helpers
use crate::domain::outcome::PageInfo;
use crate::domain::trend::DataPoint;
use crate::infrastructure::store::RawTable;

/// Ceiling division without floating point: 100001/50000 → 3, 100000/50000 → 2.
pub fn total_pages(total_count: u64, page_size: u32) -> u64 {
    let page_size = u64::from(page_size);
    if page_size == 0 {
        return 0;
    }
    let pages = total_count / page_size;
    if total_count % page_size > 0 { pages + 1 } else { pages }
}

/// Total row count from a count query response: the largest value across
/// every `count*` column (`count_C101`, `count_C102`, `count`, ...).
///
/// Flux counts pivoted rows, so its single `count` is exact. InfluxQL counts
/// each field on its own; when channels have values at different times the
/// row total is the union of those, and the densest channel's count is only
/// a lower bound.
pub fn extract_total_count(table: &RawTable) -> u64 {
    let count_columns: Vec<usize> = table
        .columns
        .iter()
        .enumerate()
        .filter(|(_, name)| name.starts_with("count"))
        .map(|(index, _)| index)
        .collect();

    table
        .rows
        .iter()
        .flat_map(|row| count_columns.iter().filter_map(|&i| row.get(i).cloned().flatten()))
        .filter_map(|cell| cell.parse::<f64>().ok())
        .filter(|n| n.is_finite() && *n >= 0.0)
        .map(|n| n as u64)
        .max()
        .unwrap_or(0)
}

pub fn page_info(total_count: u64, page_size: u32) -> PageInfo {
    PageInfo {
        total_count,
        total_pages: total_pages(total_count, page_size),
    }
}

/// Write page metadata onto element 0 only. An empty list cannot carry it.
pub fn apply_carrier(points: &mut [DataPoint], info: PageInfo) {
    if let Some(first) = points.first_mut() {
        first.total_count = Some(info.total_count);
        first.total_pages = Some(info.total_pages);
    }
}
