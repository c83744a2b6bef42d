use std::io;

pub const COMPRESSED_SUFFIX: &str = ".zst";
const PACK_LEVEL: i32 = 19;

pub fn compress_snapshot(input: &[u8]) -> io::Result<Vec<u8>> {
    zstd::stream::encode_all(input, PACK_LEVEL)
}

pub fn decompress_snapshot(input: &[u8]) -> io::Result<Vec<u8>> {
    zstd::stream::decode_all(input)
}

pub fn is_compressed_name(name: &str) -> bool {
    name.ends_with(COMPRESSED_SUFFIX)
}
