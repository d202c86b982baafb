/// Writes `first[i]`, `second[i]` pairs into `dst`. Stops at the shortest
/// of the three.
#[inline]
pub(crate) fn interleave_u8(dst: &mut [u8], first: &[u8], second: &[u8]) {
    for ((pair, a), b) in dst.chunks_exact_mut(2).zip(first).zip(second) {
        pair[0] = *a;
        pair[1] = *b;
    }
}
