//! Pairs test cases with the images built for them.

use gantry_core::JobDescriptor;
use serde::Serialize;

/// One test case and the image it runs in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestPairing {
    pub case: JobDescriptor,
    pub image: String,
}

/// Pair every case with each image whose attributes it agrees with.
///
/// Cases keep their input order; within a case, images keep theirs.
pub fn pair_cases(cases: &[JobDescriptor], images: &[(String, JobDescriptor)]) -> Vec<TestPairing> {
    cases
        .iter()
        .flat_map(|case| {
            images
                .iter()
                .filter(|(_, attributes)| case.agrees_with(attributes))
                .map(|(image, _)| TestPairing {
                    case: case.clone(),
                    image: image.clone(),
                })
        })
        .collect()
}
