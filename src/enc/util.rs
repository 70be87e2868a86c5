use super::sbac::SBAC_CTX_MODEL;

lazy_static! {
    /* cost in 1/32768 bit of coding a symbol of probability (i + 0.5) / 1024 */
    pub(crate) static ref entropy_bits: Box<[i32]> = {
        let mut bits = vec![0; 1024].into_boxed_slice();
        for i in 0..1024 {
            let p = (512.0 * (i as f64 + 0.5)) / 1024.0;
            bits[i] = (-32768.0 * (p.log10() / (2.0f64).log10() - 9.0)) as i32;
        }
        bits
    };
}

pub(crate) const FRAC_BITS_SCALE: u64 = 32768;

pub(crate) fn biari_no_bits(symbol: u32, cm: SBAC_CTX_MODEL) -> i32 {
    let mps = (cm & 1) as u32;
    let mut state = (cm >> 1) as u32;
    let sym = if symbol != 0 { 1 } else { 0 };
    state = if sym != mps { state } else { 512 - state };

    entropy_bits[((state as usize) << 1).min(1023)]
}

/* bins of a 0th order exp-golomb code */
pub(crate) fn get_exp_golomb_bits(value: u32) -> u32 {
    let mut nn = value + 1;
    let mut len = 0;
    while nn > 1 {
        nn >>= 1;
        len += 1;
    }
    (len << 1) + 1
}
