#![no_main]

use libfuzzer_sys::fuzz_target;

// Fuzz target: psi_wire::parse_header on arbitrary text/binary.
//
// Catches bugs in:
// - Marker search running past the buffer
// - Non-UTF-8 or non-numeric tag fields
// - Region marker offsets outside the input
fuzz_target!(|data: &[u8]| {
    if let Ok(header) = psi_wire::parse_header(data) {
        assert!(header.region_marker.end() <= data.len());
        assert_eq!(header.layout, psi_wire::RecordLayout::for_normals(header.has_normals));
        // Reparsing a longer snapshot must not change the header.
        let mut longer = data.to_vec();
        longer.extend_from_slice(b"\0\0\0\0");
        assert_eq!(psi_wire::parse_header(&longer).as_ref(), Ok(&header));
    }
});
