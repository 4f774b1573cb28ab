//! Decoder for SWORD's legacy LZSS block compression.
//!
//! The stream is a sequence of flag bytes, each followed by up to eight items read
//! least-significant bit first: a set bit is one literal byte, a clear bit is a two
//! byte `<position, length>` reference into a 4096 byte ring buffer.

const RING_SIZE: usize = 4096;
const MAX_STORE_LENGTH: usize = 18;
const THRESHOLD: usize = 3;

/// Decodes an LZSS stream. A truncated trailing item ends the output.
pub fn decode(input: &[u8]) -> Vec<u8> {
    let mut ring = [0u8; RING_SIZE];
    let mut r = RING_SIZE - MAX_STORE_LENGTH;
    ring[..r].fill(b' ');

    let mut out = Vec::with_capacity(input.len() * 2);
    let mut pos = 0usize;
    let mut flags = 0u8;
    let mut flag_count = 0u32;

    loop {
        if flag_count > 0 {
            flags >>= 1;
            flag_count -= 1;
        } else {
            let Some(&next) = input.get(pos) else { break };
            flags = next;
            pos += 1;
            flag_count = 7;
        }

        if flags & 1 != 0 {
            let Some(&literal) = input.get(pos) else { break };
            pos += 1;
            out.push(literal);
            ring[r] = literal;
            r = (r + 1) & (RING_SIZE - 1);
        } else {
            if pos + 2 > input.len() {
                break;
            }
            let (c0, c1) = (input[pos] as usize, input[pos + 1] as usize);
            pos += 2;
            let start = c0 | ((c1 & 0xf0) << 4);
            let len = (c1 & 0x0f) + THRESHOLD;
            for k in 0..len {
                let b = ring[(start + k) & (RING_SIZE - 1)];
                out.push(b);
                ring[r] = b;
                r = (r + 1) & (RING_SIZE - 1);
            }
        }
    }
    out
}
