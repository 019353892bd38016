//! 通用常量.

/// 几何比较时使用的相对容差.
pub const GEOMETRY_EPSILON: f32 = 1e-4;

/// 默认的投影数据段号顺序的第一个段号.
pub const DIRECT_SEGMENT: i32 = 0;

/// 重建参数的默认值.
pub mod defaults {
    /// 径向补零倍数.
    pub const PAD_S: i32 = 2;

    /// 轴向补零倍数.
    pub const PAD_Z: i32 = 2;

    /// 窗函数的 alpha 参数. 1 代表不加窗.
    pub const ALPHA: f32 = 1.0;

    /// 截止频率 (以奈奎斯特频率的倍数计, 0.5 即奈奎斯特频率).
    pub const FC: f32 = 0.5;

    /// `-1` 代表 "使用数据中可用的最大值" 或 "自动选择".
    pub const AUTO: i32 = -1;

    /// 输出文件名前缀.
    pub const OUTPUT_PREFIX: &str = "fbp3drp";
}

/// 扫描仪名称.
pub mod scanner {
    /// ECAT 953.
    pub const E953: &str = "ECAT 953";

    /// ECAT 966.
    pub const E966: &str = "ECAT 966";

    /// ECAT HR+.
    pub const HR_PLUS: &str = "ECAT HR+";

    /// 测试用的小型扫描仪.
    pub const TEST: &str = "test";
}
