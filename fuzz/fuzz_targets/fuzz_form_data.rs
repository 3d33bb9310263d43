#![no_main]
use libfuzzer_sys::fuzz_target;

use std::convert::Infallible;

use bytes::Bytes;
use futures::{executor::block_on, stream};
use multipart_params::{read_params, FormData, Storage};

// Arbitrary bytes under an arbitrary boundary must terminate, well-formed
// or not; a truncated body decodes to `Error::Incomplete`, never a hang.
fuzz_target!(|input: (String, Vec<u8>)| {
    let (boundary, body) = input;
    if boundary.is_empty() || boundary.len() > 70 {
        return;
    }

    let chunks = body
        .chunks(7)
        .map(|c| Ok::<_, Infallible>(Bytes::copy_from_slice(c)))
        .collect::<Vec<_>>();
    let form = FormData::new(stream::iter(chunks), &boundary);

    let _ = block_on(read_params(form, &Storage::Memory, encoding_rs::UTF_8));
});
