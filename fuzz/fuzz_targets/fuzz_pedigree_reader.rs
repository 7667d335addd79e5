#![no_main]

use libfuzzer_sys::fuzz_target;
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    let reader = famannot::pedigree::Reader::new(Cursor::new(data));

    // Iterate all rows - should never panic
    let mut samples = Vec::new();
    for result in reader.take(1000) {
        match result {
            Ok(sample) => {
                let _ = format!("{}", sample);
                let _ = sample.is_affected();
                let _ = sample.parents();
                samples.push(sample);
            }
            Err(_) => {
                // Width errors are expected for random input
            }
        }
    }

    // Resolving against the pedigree's own ids exercises the family ordering
    if let Ok(pedigree) = famannot::pedigree::Pedigree::from_samples(samples) {
        let names: Vec<String> = pedigree.iter().map(|s| s.individual_id.clone()).collect();
        let _ = famannot::family::FamilyIndex::resolve(&pedigree, &names);
    }
});
