//! Streaming base64 and binhex encoders.

/// Base64 encoder that can be fed in arbitrary chunks.
///
/// Up to two trailing bytes of a chunk are kept until the next chunk or
/// [`Base64Encoder::flush`], so that the concatenated output equals the
/// encoding of the concatenated input.
#[derive(Debug, Default)]
pub(crate) struct Base64Encoder {
    leftover: [u8; 2],
    leftover_len: usize,
}

const DTABLE: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

fn encode_group(igroup: &[u8], output: &mut String) {
    let mut ogroup: [u8; 4] = [b'='; 4];
    match *igroup {
        [i0, i1, i2, ..] => {
            ogroup[0] = DTABLE[i0 as usize >> 2];
            ogroup[1] = DTABLE[((i0 as usize & 3) << 4) | (i1 as usize >> 4)];
            ogroup[2] = DTABLE[((i1 as usize & 0xF) << 2) | (i2 as usize >> 6)];
            ogroup[3] = DTABLE[i2 as usize & 0x3F];
        }
        [i0, i1] => {
            ogroup[0] = DTABLE[i0 as usize >> 2];
            ogroup[1] = DTABLE[((i0 as usize & 3) << 4) | (i1 as usize >> 4)];
            ogroup[2] = DTABLE[(i1 as usize & 0xF) << 2];
        }
        [i0] => {
            ogroup[0] = DTABLE[i0 as usize >> 2];
            ogroup[1] = DTABLE[(i0 as usize & 3) << 4];
        }
        [] => return,
    }
    output.extend(ogroup.iter().map(|&b| b as char));
}

impl Base64Encoder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Check whether bytes are waiting for a complete group.
    #[cfg(test)]
    pub(crate) fn has_pending(&self) -> bool {
        self.leftover_len > 0
    }

    /// Encode `data` and append every complete group to `output`.
    pub(crate) fn encode(&mut self, mut data: &[u8], output: &mut String) {
        if self.leftover_len > 0 {
            let need = (3 - self.leftover_len).min(data.len());
            let mut group = [0; 3];
            group[..self.leftover_len].copy_from_slice(&self.leftover[..self.leftover_len]);
            group[self.leftover_len..self.leftover_len + need].copy_from_slice(&data[..need]);
            data = &data[need..];
            if self.leftover_len + need < 3 {
                self.leftover[..self.leftover_len + need]
                    .copy_from_slice(&group[..self.leftover_len + need]);
                self.leftover_len += need;
                return;
            }
            self.leftover_len = 0;
            encode_group(&group, output);
        }

        let groups = data.chunks_exact(3);
        let rem = groups.remainder();
        output.reserve(data.len() / 3 * 4);
        for igroup in groups {
            encode_group(igroup, output);
        }
        self.leftover[..rem.len()].copy_from_slice(rem);
        self.leftover_len = rem.len();
    }

    /// Emit the padded final group, if any.
    pub(crate) fn flush(&mut self, output: &mut String) {
        if self.leftover_len > 0 {
            encode_group(&self.leftover[..self.leftover_len], output);
            self.leftover_len = 0;
        }
    }
}

/// Append the uppercase hexadecimal form of `data` to `output`.
pub(crate) fn encode_bin_hex(data: &[u8], output: &mut String) {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";

    output.reserve(data.len() * 2);
    for &b in data {
        output.push(HEX[b as usize >> 4] as char);
        output.push(HEX[b as usize & 0x0F] as char);
    }
}
