use crate::api::RdoError;

pub(crate) const LFCN_INPUTS: usize = 3;
pub(crate) const LFCN_HIDDEN1: usize = 10;
pub(crate) const LFCN_HIDDEN2: usize = 5;

/// Parameters of a three layer split predictor: inputs -> ReLU -> sigmoid -> sigmoid.
///
/// Weights are stored input major, `w1[j * hidden1 + i]` connects input `j` to unit `i`.
#[derive(Debug, Clone, PartialEq)]
pub struct LfcnModel {
    pub name: &'static str,
    pub version: u32,
    pub w1: Vec<f64>,
    pub b1: Vec<f64>,
    pub w2: Vec<f64>,
    pub b2: Vec<f64>,
    pub w3: Vec<f64>,
    pub b3: f64,
}

fn check_len(name: &'static str, layer: &'static str, expected: usize, found: usize) -> Result<(), RdoError> {
    if expected != found {
        return Err(RdoError::ModelShape {
            name,
            layer,
            expected,
            found,
        });
    }
    Ok(())
}

impl LfcnModel {
    pub fn hidden1(&self) -> usize {
        self.b1.len()
    }

    pub fn hidden2(&self) -> usize {
        self.b2.len()
    }

    /// Layer sizes must agree with `LFCN_INPUTS` inputs and the bias lengths.
    pub fn validate(&self) -> Result<(), RdoError> {
        let (h1, h2) = (self.hidden1(), self.hidden2());
        check_len(self.name, "w1", LFCN_INPUTS * h1, self.w1.len())?;
        check_len(self.name, "w2", h1 * h2, self.w2.len())?;
        check_len(self.name, "w3", h2, self.w3.len())?;
        Ok(())
    }

    /// Score in (0, 1) of the feature vector `x`.
    pub fn infer(&self, x: &[f64; LFCN_INPUTS]) -> f64 {
        let (h1, h2) = (self.hidden1(), self.hidden2());
        let hidden1: Vec<f64> = (0..h1)
            .map(|i| {
                let u = (0..LFCN_INPUTS).map(|j| x[j] * self.w1[j * h1 + i]).sum::<f64>() + self.b1[i];
                relu(u)
            })
            .collect();
        let hidden2: Vec<f64> = (0..h2)
            .map(|i| {
                let u = (0..h1).map(|j| hidden1[j] * self.w2[j * h2 + i]).sum::<f64>() + self.b2[i];
                sigmoid(u)
            })
            .collect();
        let y = hidden2.iter().zip(self.w3.iter()).map(|(h, w)| h * w).sum::<f64>() + self.b3;
        sigmoid(y)
    }
}

#[inline]
fn relu(u: f64) -> f64 {
    if u > 0.0 {
        u
    } else {
        0.0
    }
}

#[inline]
pub(crate) fn sigmoid(u: f64) -> f64 {
    1.0 / (1.0 + (-u).exp())
}

/*****************************************************************************
 * P slices, geometry
 *****************************************************************************/
#[rustfmt::skip]
static tbl_lfcn_p_geo_w1: [f64; 30] = [
    -0.1798137,   0.015715983,  -0.09532983,  -0.12949441,  -0.016367447, 0.56853455,   -0.13140851,  -0.12590483,
    0.5730921,    0.07826559,   -0.119140275, 0.010980937,  -0.041487183, -0.015314037, -0.019670215, 0.4799034,
    -0.040534467, -0.050889056, 0.57576144,   -0.029060448, -0.5683938,   0.013555974,  0.042025037,  -0.7310104,
    -0.004070325, 1.1931382,    -0.6871277,   -0.026506832, 1.1419412,    -0.056911822,
];
#[rustfmt::skip]
static tbl_lfcn_p_geo_b1: [f64; 10] = [
    0.8574694,  -0.03832592, -0.029819846, 0.8761555,   -0.05974367,
    -0.2603977, 0.86793953,  -0.04469238,  -0.18879512, -0.078819275,
];
#[rustfmt::skip]
static tbl_lfcn_p_geo_w2: [f64; 50] = [
    -1.5059104,  -1.3450825,  -1.43051,    1.477028,     1.480278,     -0.0066613876, -0.010042782, -0.10854612,
    0.043490637, 0.025427084, 0.010881705, -0.031549543, -0.010803781, -0.035900652,  -0.08626275,  -1.8950084,
    -1.8535957,  -1.8098618,  1.8292805,   1.7869675,    0.008852309,  -0.011014264,  0.023642553,  0.037875876,
    0.035256337, 1.2992209,   1.3258094,   1.350649,     -1.3084512,   -1.28103,      -1.8162,      -1.7824688,
    -1.7318273,  1.8208646,   1.7572726,   0.06479486,   0.057287093,  0.059295353,   0.07287708,   -0.05606584,
    1.1962177,   1.0893365,   1.1233077,   -1.1840847,   -1.1880049,   0.071519755,   0.0057525644, -0.06867385,
    -0.06903744, -0.036188617,
];
#[rustfmt::skip]
static tbl_lfcn_p_geo_b2: [f64; 5] = [-0.18987358, -0.08684765, -0.29997537, 0.23931256, 0.29157344];
#[rustfmt::skip]
static tbl_lfcn_p_geo_w3: [f64; 5] = [2.3271866, 2.291772, 2.3157434, -2.4887452, -2.4943295];
static tbl_lfcn_p_geo_b3: f64 = -0.3431725;

/*****************************************************************************
 * P slices, attribute
 *****************************************************************************/
#[rustfmt::skip]
static tbl_lfcn_p_att_w1: [f64; 30] = [
    0.38778436,  -0.007314995, 0.33233833,   0.36591738,    0.4208757,  0.3915192,   0.022857603, -0.015012168,
    0.0021270008, -0.0051038982, 0.059003677, 0.065315135,  0.07027739, 0.41112804,  0.0588191,   0.02490963,
    0.04832394,  0.008314324,  -0.03013271,  0.024819389,   0.92511517, -0.09174364, 0.9075054,   0.8722612,
    1.0292256,   1.1075729,    -0.039412506, 0.039779317,   0.009898708, 0.036773242,
];
#[rustfmt::skip]
static tbl_lfcn_p_att_b1: [f64; 10] = [
    -0.09741153, -0.05833369, -0.09079688,  -0.6771248,  -0.11397923,
    -0.6344252,  -0.06651615, -0.029567974, -0.05385367, -0.04727762,
];
#[rustfmt::skip]
static tbl_lfcn_p_att_w2: [f64; 50] = [
    -0.9188661,  -1.0477335,  -0.9269158,   0.8647607,   1.0614995,    -0.08677276, 0.050005186, -0.0061682737,
    0.10102158,  -0.047413867, -0.8767638,  -1.1435426,  -0.9832114,   0.9889068,   1.1729834,   -2.9734714,
    -2.757544,   -2.9321315,  2.9902015,    2.7917132,   -1.0080203,   -1.1630646,  -1.0566517,  0.93173665,
    1.1421729,   -3.598869,   -3.1084049,   -3.3781476,  3.4908228,    3.0106144,   -0.09670318, -0.04485282,
    -0.022119856, -0.050046027, -0.060104396, -0.010417917, 0.03764891, 0.026927702, 0.016772207, -0.025491703,
    0.01552383,  -0.0738545,  0.030917257,  -0.0945312,  0.037042968,  0.004715443, -0.06587834, 0.0051364466,
    -0.041220848, -0.021615531,
];
#[rustfmt::skip]
static tbl_lfcn_p_att_b2: [f64; 5] = [1.7809409, 1.437488, 1.700708, -1.6271535, -1.4059961];
#[rustfmt::skip]
static tbl_lfcn_p_att_w3: [f64; 5] = [-2.4459467, -2.511491, -2.4142091, 2.8143487, 2.7357085];
static tbl_lfcn_p_att_b3: f64 = 0.48611394;

/*****************************************************************************
 * I slices, geometry
 *****************************************************************************/
#[rustfmt::skip]
static tbl_lfcn_i_geo_w1: [f64; 30] = [
    0.6891816,   -0.032851584, -0.07149959,  0.1327268,   -0.031111201, -0.013056578, -0.17099088, -0.13880853,
    -2.5727057,  -0.5805173,   0.13167034,   -0.054828633, -0.47254786, 0.6590843,    0.014007426, -0.032431256,
    -0.6763731,  -0.43721578,  -0.11417717,  -0.59266067,  1.7472414,   0.04121032,   -0.75080377, 1.8364912,
    -0.101214945, -0.004063612, -0.5388431,  -0.76438826,  0.29453498,  -0.35285744,
];
#[rustfmt::skip]
static tbl_lfcn_i_geo_b1: [f64; 10] = [
    0.053268004,  -0.15858771, 0.9373012, -0.0056827045, -0.060157437,
    -0.011107092, 1.0216832,   0.9162116, 0.7341579,     0.9352663,
];
#[rustfmt::skip]
static tbl_lfcn_i_geo_w2: [f64; 50] = [
    0.730095,    -1.5902374,  -1.4260284,   1.8777653,   2.1345243,    0.009160237, 0.0020384693, -0.024743749,
    0.029532894, -0.025439087, -2.1620114,  1.9589972,   -0.50337994,  -2.2293231,  -2.6179252,   0.57881624,
    -1.7947954,  -0.67919695, 1.8029268,    2.536627,    -0.00031412483, -0.029971926, 0.057302352, 0.03557874,
    -0.014848113, 0.072738044, -0.08819018, 0.013006314, -0.1172115,   0.086894706, -3.095519,    1.5223482,
    -0.6347482,  -1.7568599,  -2.2616343,   -2.2669876,  2.0884976,    -0.42797062, -2.1458473,   -2.5100088,
    -3.8781316,  1.2264118,   4.9437575,    -0.46441874, 1.3488111,    -3.7643235,  1.1565139,    -0.026370969,
    -1.3415911,  -1.7141935,
];
#[rustfmt::skip]
static tbl_lfcn_i_geo_b2: [f64; 5] = [-0.40222603, 0.038892575, -0.48762688, -0.06750394, 0.04712745];
#[rustfmt::skip]
static tbl_lfcn_i_geo_w3: [f64; 5] = [4.585394, -4.635746, -5.3902903, 1.4180381, 1.6833978];
static tbl_lfcn_i_geo_b3: f64 = -1.2666923;

/*****************************************************************************
 * I slices, attribute
 *****************************************************************************/
#[rustfmt::skip]
static tbl_lfcn_i_att_w1: [f64; 30] = [
    -0.3399334,  -4.2346177,   -0.09606053, -1.9594648,   -0.083944865, 0.7173832,  0.5212202,   -0.029234419,
    -0.42640632, 0.035182115,  -0.28761864, -0.2260642,   -0.030421784, -0.1238716, -0.05297501, 0.84043366,
    0.7088765,   -0.05069234,  -0.20634308, -0.04941558,  -1.027468,    0.0034996956, 0.015534068, 1.1255032,
    0.024796126, 1.6061252,    1.6438757,   0.08391107,   -1.0014163,   -0.10561229,
];
#[rustfmt::skip]
static tbl_lfcn_i_att_b1: [f64; 10] = [
    1.0356098,  0.4776824,  -0.1347511,  0.11729125, -0.052083444,
    -0.2584819, -0.1723621, -0.09161258, 1.0184947,  -0.03605778,
];
#[rustfmt::skip]
static tbl_lfcn_i_att_w2: [f64; 50] = [
    -2.437292,   1.610624,    -1.5597881,   1.6304326,    -1.4551742,  1.157308,     6.680512,    -2.5165,
    6.8099475,   -5.1118183,  0.043091673,  0.05795094,   -0.016092842, 0.0010595184, 0.042020276, -3.456434,
    0.05806105,  -2.4778214,  -0.06356614,  -1.4688472,   -0.09521533, -0.00036730454, -0.089662425, -0.059034307,
    -0.010170054, 0.8435426,  -1.6657287,   1.1937068,    -1.6841154,  1.5154018,    0.6038032,   -1.8238503,
    0.95434284,  -1.814911,   1.2709001,    0.044319823,  0.031158386, 0.038542103,  -0.024861578, -0.06378681,
    -2.3413324,  1.5640033,   -1.2784584,   1.5854845,    -1.3741953,  -0.022077857, 0.013171807, -0.014771372,
    0.022822618, 0.03274649,
];
#[rustfmt::skip]
static tbl_lfcn_i_att_b2: [f64; 5] = [-0.88686234, 0.00551265, -0.46492913, -0.017391888, -0.17816842];
#[rustfmt::skip]
static tbl_lfcn_i_att_w3: [f64; 5] = [2.8143318, -3.5012615, 1.5834863, -3.524372, 1.5158705];
static tbl_lfcn_i_att_b3: f64 = -0.7981659;

macro_rules! lfcn_model {
    ($name:expr, $w1:ident, $b1:ident, $w2:ident, $b2:ident, $w3:ident, $b3:ident) => {
        LfcnModel {
            name: $name,
            version: 1,
            w1: $w1.to_vec(),
            b1: $b1.to_vec(),
            w2: $w2.to_vec(),
            b2: $b2.to_vec(),
            w3: $w3.to_vec(),
            b3: $b3,
        }
    };
}

lazy_static! {
    pub static ref LFCN_P_GEOMETRY: LfcnModel = lfcn_model!(
        "lfcn-p-geometry", tbl_lfcn_p_geo_w1, tbl_lfcn_p_geo_b1, tbl_lfcn_p_geo_w2,
        tbl_lfcn_p_geo_b2, tbl_lfcn_p_geo_w3, tbl_lfcn_p_geo_b3
    );
    pub static ref LFCN_P_ATTRIBUTE: LfcnModel = lfcn_model!(
        "lfcn-p-attribute", tbl_lfcn_p_att_w1, tbl_lfcn_p_att_b1, tbl_lfcn_p_att_w2,
        tbl_lfcn_p_att_b2, tbl_lfcn_p_att_w3, tbl_lfcn_p_att_b3
    );
    pub static ref LFCN_I_GEOMETRY: LfcnModel = lfcn_model!(
        "lfcn-i-geometry", tbl_lfcn_i_geo_w1, tbl_lfcn_i_geo_b1, tbl_lfcn_i_geo_w2,
        tbl_lfcn_i_geo_b2, tbl_lfcn_i_geo_w3, tbl_lfcn_i_geo_b3
    );
    pub static ref LFCN_I_ATTRIBUTE: LfcnModel = lfcn_model!(
        "lfcn-i-attribute", tbl_lfcn_i_att_w1, tbl_lfcn_i_att_b1, tbl_lfcn_i_att_w2,
        tbl_lfcn_i_att_b2, tbl_lfcn_i_att_w3, tbl_lfcn_i_att_b3
    );
}
