//! 运行结果.

use std::io::{self, Write};
use std::path::PathBuf;

/// 一次重建的摘要.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub scanner: String,
    pub num_segments: i32,
    /// 图像的 `[z, y, x]` 下标范围.
    pub bounds: [(i32, i32); 3],
    pub min: f32,
    pub max: f32,
    pub sum: f32,
    /// 拟合系数 `(alpha, beta)`.
    pub fit: (f32, f32),
    pub total_ms: u64,
    pub forward_ms: u64,
    pub back_ms: u64,
    pub outputs: Vec<PathBuf>,
    pub cpus: usize,
}

/// 将 `s` 写进 `w` 中.
fn describe_into<W: Write>(s: &RunSummary, w: &mut W) -> io::Result<()> {
    const S4: &str = "    ";

    let [(z0, z1), (y0, y1), (x0, x1)] = s.bounds;
    writeln!(w, "Scanner `{}`, {} segments:", s.scanner, s.num_segments)?;
    writeln!(w, "{S4}Image: z {z0}..={z1}, y {y0}..={y1}, x {x0}..={x1}")?;
    writeln!(w, "{S4}min = {:.6}, max = {:.6}, sum = {:.6}", s.min, s.max, s.sum)?;
    writeln!(w, "{S4}Fit: alpha = {:.6}, beta = {:.6}", s.fit.0, s.fit.1)?;
    writeln!(w, "{S4}Total time: {} ms", s.total_ms)?;
    writeln!(w, "{S4}Forward projection: {} ms", s.forward_ms)?;
    writeln!(w, "{S4}Back projection: {} ms", s.back_ms)?;
    writeln!(w, "{S4}Available cores: {}", s.cpus)?;
    for p in s.outputs.iter() {
        writeln!(w, "{S4}Written: {}", p.display())?;
    }
    Ok(())
}

impl RunSummary {
    /// 带分隔线的完整报告.
    fn report(&self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(512);
        utils::sep_to(&mut buf)?;
        describe_into(self, &mut buf)?;
        utils::sep_to(&mut buf)?;
        Ok(buf)
    }

    /// 打印运行结果.
    pub fn analyze(&self) {
        match self.report() {
            Ok(buf) => print!("{}", String::from_utf8_lossy(&buf)),
            Err(e) => eprintln!("无法生成报告: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> RunSummary {
        RunSummary {
            scanner: "test".to_owned(),
            num_segments: 3,
            bounds: [(0, 14), (-16, 16), (-16, 16)],
            min: -0.1,
            max: 1.2,
            sum: 100.0,
            fit: (1.0, 0.0),
            total_ms: 12,
            forward_ms: 3,
            back_ms: 4,
            outputs: vec![PathBuf::from("out/fbp3drp.nii")],
            cpus: 4,
        }
    }

    #[test]
    fn test_describe() {
        let s = summary();
        let mut buf = Vec::new();
        describe_into(&s, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("Scanner `test`, 3 segments:"));
        assert!(text.contains("z 0..=14"));
        assert!(text.contains("Written: out/fbp3drp.nii"));
    }

    #[test]
    fn test_report_is_framed_by_separators() {
        let text = String::from_utf8(summary().report().unwrap()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("-----"));
        assert_eq!(lines[0], *lines.last().unwrap());
        assert_eq!(lines[1], "Scanner `test`, 3 segments:");
    }
}
