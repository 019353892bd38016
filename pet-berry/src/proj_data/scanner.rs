//! 扫描仪几何参数及内置的扫描仪目录.

use crate::consts::scanner as names;
use once_cell::sync::Lazy;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 圆柱形 PET 扫描仪.
///
/// 长度单位均为毫米.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct Scanner {
    name: String,
    num_rings: i32,
    num_detectors_per_ring: i32,
    ring_radius: f32,
    ring_spacing: f32,
    default_bin_size: f32,
    default_num_arccorrected_bins: i32,
}

static CATALOGUE: Lazy<Vec<Scanner>> = Lazy::new(|| {
    vec![
        Scanner::new_unchecked(names::E953, 16, 384, 382.0, 6.75, 3.129, 160),
        Scanner::new_unchecked(names::E966, 48, 576, 412.0, 4.85, 2.25, 288),
        Scanner::new_unchecked(names::HR_PLUS, 32, 576, 412.0, 4.85, 2.25, 288),
        Scanner::new_unchecked(names::TEST, 8, 64, 100.0, 5.0, 4.0, 32),
    ]
});

impl Scanner {
    /// 自定义扫描仪. 任一数值参数不为正, 或每环探测器数不是偶数时返回 `None`.
    pub fn new(
        name: &str,
        num_rings: i32,
        num_detectors_per_ring: i32,
        ring_radius: f32,
        ring_spacing: f32,
        default_bin_size: f32,
        default_num_arccorrected_bins: i32,
    ) -> Option<Self> {
        let ok = num_rings > 0
            && num_detectors_per_ring > 0
            && num_detectors_per_ring % 2 == 0
            && ring_radius > 0.0
            && ring_spacing > 0.0
            && default_bin_size > 0.0
            && default_num_arccorrected_bins > 0;
        ok.then(|| {
            Self::new_unchecked(
                name,
                num_rings,
                num_detectors_per_ring,
                ring_radius,
                ring_spacing,
                default_bin_size,
                default_num_arccorrected_bins,
            )
        })
    }

    fn new_unchecked(
        name: &str,
        num_rings: i32,
        num_detectors_per_ring: i32,
        ring_radius: f32,
        ring_spacing: f32,
        default_bin_size: f32,
        default_num_arccorrected_bins: i32,
    ) -> Self {
        Self {
            name: name.to_owned(),
            num_rings,
            num_detectors_per_ring,
            ring_radius,
            ring_spacing,
            default_bin_size,
            default_num_arccorrected_bins,
        }
    }

    /// 从内置目录中按名称查找 (大小写不敏感).
    pub fn by_name(name: &str) -> Option<Self> {
        CATALOGUE
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name.trim()))
            .cloned()
    }

    /// 内置目录中所有扫描仪的名称.
    pub fn list_names() -> Vec<&'static str> {
        CATALOGUE.iter().map(|s| s.name.as_str()).collect()
    }

    /// 名称.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 环数.
    #[inline]
    pub fn num_rings(&self) -> i32 {
        self.num_rings
    }

    /// 每环探测器数.
    #[inline]
    pub fn num_detectors_per_ring(&self) -> i32 {
        self.num_detectors_per_ring
    }

    /// 环半径.
    #[inline]
    pub fn ring_radius(&self) -> f32 {
        self.ring_radius
    }

    /// 相邻环的轴向间距.
    #[inline]
    pub fn ring_spacing(&self) -> f32 {
        self.ring_spacing
    }

    /// 弧校正后的默认径向采样间隔.
    #[inline]
    pub fn default_bin_size(&self) -> f32 {
        self.default_bin_size
    }

    /// 弧校正后的默认径向采样个数.
    #[inline]
    pub fn default_num_arccorrected_bins(&self) -> i32 {
        self.default_num_arccorrected_bins
    }

    /// 默认的视角个数, 即每环探测器数的一半.
    #[inline]
    pub fn max_num_views(&self) -> i32 {
        self.num_detectors_per_ring / 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalogue() {
        let s = Scanner::by_name("ecat 953").unwrap();
        assert_eq!(s.num_rings(), 16);
        assert_eq!(s.max_num_views(), 192);
        assert!(Scanner::by_name("nope").is_none());
        assert_eq!(Scanner::list_names().len(), 4);
    }

    #[test]
    fn test_rejects_odd_detectors() {
        assert!(Scanner::new("x", 4, 63, 100.0, 5.0, 4.0, 32).is_none());
        assert!(Scanner::new("x", 4, 64, 100.0, 5.0, 4.0, 32).is_some());
    }
}
