#![no_main]

use dt_filter::{FilterCriteria, apply_today};
use dt_groupby::by_sponsor_category;
use dt_io::{read_csv_bytes, write_csv_string};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(loaded) = read_csv_bytes(data) else {
        return;
    };

    // Anything that loads must survive the pipeline and re-export.
    let filtered = apply_today(&loaded.table, &FilterCriteria::unrestricted());
    assert_eq!(filtered.len(), loaded.table.len());
    let aggregation = by_sponsor_category(&filtered).expect("sponsor_category is categorical");
    assert!(aggregation.len() <= filtered.len());
    let _ = write_csv_string(&filtered);
});
