//! Small transform-math toolbox shared by the mechanics and fixture crates.
//!
//! Conventions:
//! - quaternions are `[x, y, z, w]`
//! - matrices are 4x4 column major, translation in elements 12..15
//! - all angles are radians

/// Linear interpolation for f32
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[inline]
pub fn lerp3(a: [f32; 3], b: [f32; 3], t: f32) -> [f32; 3] {
    [
        lerp(a[0], b[0], t),
        lerp(a[1], b[1], t),
        lerp(a[2], b[2], t),
    ]
}

pub const QUAT_IDENTITY: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

pub const MAT4_IDENTITY: [f32; 16] = [
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, //
    0.0, 0.0, 0.0, 1.0,
];

#[inline]
pub fn vec3_add(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

#[inline]
pub fn vec3_sub(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline]
pub fn vec3_scale(v: [f32; 3], s: f32) -> [f32; 3] {
    [v[0] * s, v[1] * s, v[2] * s]
}

#[inline]
pub fn vec3_dot(a: [f32; 3], b: [f32; 3]) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline]
pub fn vec3_cross(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

#[inline]
pub fn vec3_length(v: [f32; 3]) -> f32 {
    vec3_dot(v, v).sqrt()
}

pub fn vec3_normalize(v: [f32; 3]) -> [f32; 3] {
    let len = vec3_length(v);
    if len == 0.0 {
        [0.0, 0.0, 0.0]
    } else {
        vec3_scale(v, 1.0 / len)
    }
}

/// Normalize a quaternion represented as [x,y,z,w]
pub fn quat_normalize(q: [f32; 4]) -> [f32; 4] {
    let mag = (q[0] * q[0] + q[1] * q[1] + q[2] * q[2] + q[3] * q[3]).sqrt();
    if mag == 0.0 {
        QUAT_IDENTITY
    } else {
        [q[0] / mag, q[1] / mag, q[2] / mag, q[3] / mag]
    }
}

#[inline]
pub fn quat_dot(a: [f32; 4], b: [f32; 4]) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2] + a[3] * b[3]
}

/// Hamilton product; `quat_mul(a, b)` applies `b` first, then `a`.
pub fn quat_mul(a: [f32; 4], b: [f32; 4]) -> [f32; 4] {
    let [ax, ay, az, aw] = a;
    let [bx, by, bz, bw] = b;
    [
        aw * bx + ax * bw + ay * bz - az * by,
        aw * by - ax * bz + ay * bw + az * bx,
        aw * bz + ax * by - ay * bx + az * bw,
        aw * bw - ax * bx - ay * by - az * bz,
    ]
}

/// Inverse of a unit quaternion.
#[inline]
pub fn quat_conjugate(q: [f32; 4]) -> [f32; 4] {
    [-q[0], -q[1], -q[2], q[3]]
}

pub fn quat_rotate_vec3(q: [f32; 4], v: [f32; 3]) -> [f32; 3] {
    let qv = [q[0], q[1], q[2]];
    let uv = vec3_cross(qv, v);
    let uuv = vec3_cross(qv, uv);
    vec3_add(v, vec3_scale(vec3_add(vec3_scale(uv, q[3]), uuv), 2.0))
}

/// Axis-angle constructor; `axis` need not be normalized.
pub fn quat_from_axis_angle(axis: [f32; 3], angle: f32) -> [f32; 4] {
    let axis = vec3_normalize(axis);
    let half = angle * 0.5;
    let s = half.sin();
    [axis[0] * s, axis[1] * s, axis[2] * s, half.cos()]
}

/// Slerp between two unit quaternions, always along the shortest arc.
pub fn slerp(q1: [f32; 4], q2: [f32; 4], t: f32) -> [f32; 4] {
    let qa = quat_normalize(q1);
    let mut qb = quat_normalize(q2);

    let mut dot = quat_dot(qa, qb);

    // If the dot product is negative, slerp won't take the short path.
    // Fix by reversing one quaternion.
    if dot < 0.0 {
        qb = [-qb[0], -qb[1], -qb[2], -qb[3]];
        dot = -dot;
    }

    // If quaternions are close, use lerp
    const DOT_THRESHOLD: f32 = 0.9995;
    if dot > DOT_THRESHOLD {
        let res = [
            lerp(qa[0], qb[0], t),
            lerp(qa[1], qb[1], t),
            lerp(qa[2], qb[2], t),
            lerp(qa[3], qb[3], t),
        ];
        return quat_normalize(res);
    }

    let theta_0 = dot.clamp(-1.0, 1.0).acos();
    let theta = theta_0 * t;
    let sin_theta = theta.sin();
    let sin_theta_0 = theta_0.sin();

    let s0 = ((theta_0 - theta).sin()) / sin_theta_0;
    let s1 = sin_theta / sin_theta_0;

    [
        s0 * qa[0] + s1 * qb[0],
        s0 * qa[1] + s1 * qb[1],
        s0 * qa[2] + s1 * qb[2],
        s0 * qa[3] + s1 * qb[3],
    ]
}

pub fn mat4_mul(a: &[f32; 16], b: &[f32; 16]) -> [f32; 16] {
    let mut out = [0.0f32; 16];
    for c in 0..4 {
        for r in 0..4 {
            let mut acc = 0.0;
            for k in 0..4 {
                acc += a[k * 4 + r] * b[c * 4 + k];
            }
            out[c * 4 + r] = acc;
        }
    }
    out
}

pub fn mat4_transform_point(m: &[f32; 16], p: [f32; 3]) -> [f32; 3] {
    [
        m[0] * p[0] + m[4] * p[1] + m[8] * p[2] + m[12],
        m[1] * p[0] + m[5] * p[1] + m[9] * p[2] + m[13],
        m[2] * p[0] + m[6] * p[1] + m[10] * p[2] + m[14],
    ]
}

#[inline]
pub fn mat4_translation(m: &[f32; 16]) -> [f32; 3] {
    [m[12], m[13], m[14]]
}

pub fn mat4_from_translation(t: [f32; 3]) -> [f32; 16] {
    let mut m = MAT4_IDENTITY;
    m[12] = t[0];
    m[13] = t[1];
    m[14] = t[2];
    m
}

/// Compose translation / rotation / scale into a column-major matrix.
pub fn mat4_from_trs(t: [f32; 3], r: [f32; 4], s: [f32; 3]) -> [f32; 16] {
    let [x, y, z, w] = quat_normalize(r);
    let (xx, yy, zz) = (x * x, y * y, z * z);
    let (xy, xz, yz) = (x * y, x * z, y * z);
    let (wx, wy, wz) = (w * x, w * y, w * z);
    [
        (1.0 - 2.0 * (yy + zz)) * s[0],
        (2.0 * (xy + wz)) * s[0],
        (2.0 * (xz - wy)) * s[0],
        0.0,
        (2.0 * (xy - wz)) * s[1],
        (1.0 - 2.0 * (xx + zz)) * s[1],
        (2.0 * (yz + wx)) * s[1],
        0.0,
        (2.0 * (xz + wy)) * s[2],
        (2.0 * (yz - wx)) * s[2],
        (1.0 - 2.0 * (xx + yy)) * s[2],
        0.0,
        t[0],
        t[1],
        t[2],
        1.0,
    ]
}

/// Extract translation, rotation and scale from an affine matrix.
/// Negative scale is not recovered (rig transforms do not mirror via scale
/// here; mirroring happens through behaviors).
pub fn mat4_decompose(m: &[f32; 16]) -> ([f32; 3], [f32; 4], [f32; 3]) {
    let t = mat4_translation(m);
    let sx = vec3_length([m[0], m[1], m[2]]);
    let sy = vec3_length([m[4], m[5], m[6]]);
    let sz = vec3_length([m[8], m[9], m[10]]);
    let s = [sx, sy, sz];
    let inv = [
        if sx == 0.0 { 0.0 } else { 1.0 / sx },
        if sy == 0.0 { 0.0 } else { 1.0 / sy },
        if sz == 0.0 { 0.0 } else { 1.0 / sz },
    ];
    let r = rotation_to_quat([
        m[0] * inv[0],
        m[1] * inv[0],
        m[2] * inv[0],
        m[4] * inv[1],
        m[5] * inv[1],
        m[6] * inv[1],
        m[8] * inv[2],
        m[9] * inv[2],
        m[10] * inv[2],
    ]);
    (t, r, s)
}

/// Shepperd's method over a 3x3 column-major rotation block.
fn rotation_to_quat(r: [f32; 9]) -> [f32; 4] {
    let (m00, m10, m20) = (r[0], r[1], r[2]);
    let (m01, m11, m21) = (r[3], r[4], r[5]);
    let (m02, m12, m22) = (r[6], r[7], r[8]);
    let trace = m00 + m11 + m22;
    let q = if trace > 0.0 {
        let s = (trace + 1.0).sqrt() * 2.0;
        [
            (m21 - m12) / s,
            (m02 - m20) / s,
            (m10 - m01) / s,
            0.25 * s,
        ]
    } else if m00 > m11 && m00 > m22 {
        let s = (1.0 + m00 - m11 - m22).sqrt() * 2.0;
        [
            0.25 * s,
            (m01 + m10) / s,
            (m02 + m20) / s,
            (m21 - m12) / s,
        ]
    } else if m11 > m22 {
        let s = (1.0 + m11 - m00 - m22).sqrt() * 2.0;
        [
            (m01 + m10) / s,
            0.25 * s,
            (m12 + m21) / s,
            (m02 - m20) / s,
        ]
    } else {
        let s = (1.0 + m22 - m00 - m11).sqrt() * 2.0;
        [
            (m02 + m20) / s,
            (m12 + m21) / s,
            0.25 * s,
            (m10 - m01) / s,
        ]
    };
    quat_normalize(q)
}

/// Invert an affine (TRS) matrix.
pub fn mat4_invert_affine(m: &[f32; 16]) -> [f32; 16] {
    // General 3x3 inverse of the upper-left block, then translate back.
    let a = [m[0], m[1], m[2]];
    let b = [m[4], m[5], m[6]];
    let c = [m[8], m[9], m[10]];
    let r0 = vec3_cross(b, c);
    let r1 = vec3_cross(c, a);
    let r2 = vec3_cross(a, b);
    let det = vec3_dot(a, r0);
    let inv_det = if det == 0.0 { 0.0 } else { 1.0 / det };
    let i00 = r0[0] * inv_det;
    let i01 = r1[0] * inv_det;
    let i02 = r2[0] * inv_det;
    let i10 = r0[1] * inv_det;
    let i11 = r1[1] * inv_det;
    let i12 = r2[1] * inv_det;
    let i20 = r0[2] * inv_det;
    let i21 = r1[2] * inv_det;
    let i22 = r2[2] * inv_det;
    let t = mat4_translation(m);
    [
        i00,
        i10,
        i20,
        0.0,
        i01,
        i11,
        i21,
        0.0,
        i02,
        i12,
        i22,
        0.0,
        -(i00 * t[0] + i01 * t[1] + i02 * t[2]),
        -(i10 * t[0] + i11 * t[1] + i12 * t[2]),
        -(i20 * t[0] + i21 * t[1] + i22 * t[2]),
        1.0,
    ]
}
