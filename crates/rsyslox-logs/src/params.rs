use rsyslox_types::{FilterState, QueryParams};

use crate::pagination::Pagination;
use crate::time_window::ResolvedWindow;

pub const LIMIT: &str = "limit";
pub const OFFSET: &str = "offset";
pub const START_DATE: &str = "start_date";
pub const END_DATE: &str = "end_date";
pub const SEVERITY: &str = "Severity";
pub const FACILITY: &str = "Facility";
pub const HOST: &str = "FromHost";
pub const TAG: &str = "SysLogTag";
pub const MESSAGE: &str = "Message";

/// Build the query endpoint parameters.
///
/// `limit` and `offset` are always present. Each filter value becomes its
/// own pair under the filter's key; blank filters are left out entirely.
pub fn build_params(
    filters: &FilterState,
    window: &ResolvedWindow,
    pagination: &Pagination,
) -> QueryParams {
    let mut params = QueryParams::new();
    params.push(LIMIT, pagination.limit());
    params.push(OFFSET, pagination.offset());

    if let Some(start) = &window.start {
        params.push(START_DATE, start);
    }
    if let Some(end) = &window.end {
        params.push(END_DATE, end);
    }

    for severity in &filters.severities {
        params.push(SEVERITY, severity);
    }
    for facility in &filters.facilities {
        params.push(FACILITY, facility);
    }
    for host in filters.hosts.iter().filter(|h| !h.trim().is_empty()) {
        params.push(HOST, host);
    }
    for tag in filters.tags.iter().filter(|t| !t.trim().is_empty()) {
        params.push(TAG, tag);
    }

    let message = filters.message.trim();
    if !message.is_empty() {
        params.push(MESSAGE, message);
    }

    params
}
