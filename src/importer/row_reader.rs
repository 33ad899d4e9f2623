// ==========================================
// 商品数据导入 - CSV 行读取器
// ==========================================
// 职责: 读取带表头的 CSV,每行生成一个 DataSet
// 约定: 表头与单元格 TRIM；空单元格 → NULL；全空白行跳过
// 行号: 数据行从 1 开始（不含表头,跳过的空行与全空白行仍占号）
// ==========================================

use crate::importer::data_set::{DataSet, DataValue};
use crate::importer::error::{ImportError, ImportResult};
use csv::ReaderBuilder;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::info;

// ==========================================
// CsvRowReader
// ==========================================
pub struct CsvRowReader {
    path: PathBuf,
}

impl CsvRowReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 读取全部数据行
    ///
    /// # 返回
    /// - Ok(Vec<DataSet>): 按文件顺序
    /// - Err(FileNotFound / UnsupportedFormat / CsvParseError)
    pub fn read_all(&self) -> ImportResult<Vec<DataSet>> {
        let path = self.path.as_path();

        // 检查文件存在
        if !path.exists() {
            return Err(ImportError::FileNotFound(path.display().to_string()));
        }

        // 检查扩展名
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        if ext != "csv" {
            return Err(ImportError::UnsupportedFormat(ext));
        }

        let rows = read_rows(File::open(path)?)?;

        info!(
            file = %path.display(),
            rows = rows.len(),
            "CSV 读取完成"
        );

        Ok(rows)
    }
}

/// 从任意 Reader 解析数据行
pub fn read_rows<R: Read>(source: R) -> ImportResult<Vec<DataSet>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true) // 允许行长度不一致
        .from_reader(source);

    // 读取表头
    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for (row_idx, result) in reader.records().enumerate() {
        let record = result?;

        // 跳过完全空白的行
        if record.iter().all(|value| value.trim().is_empty()) {
            continue;
        }

        // 行号取自记录起始物理行（表头占第 1 行）；csv 会静默跳过真正的空行
        let row_number = record
            .position()
            .map(|pos| pos.line().saturating_sub(1) as usize)
            .unwrap_or(row_idx + 1);
        let mut data_set = DataSet::new(row_number);
        for (col_idx, header) in headers.iter().enumerate() {
            if header.is_empty() {
                continue;
            }
            let value = match record.get(col_idx).map(str::trim) {
                Some(v) if !v.is_empty() => DataValue::Text(v.to_string()),
                _ => DataValue::Null,
            };
            data_set.set(header.as_str(), value);
        }

        rows.push(data_set);
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    #[test]
    fn test_read_rows_null_for_empty_cells() {
        let csv = "abstract_sku,color_code,new_from\n001,#DC2E09,\n002, ,2030-01-01\n";

        let rows = read_rows(csv.as_bytes()).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].row_number(), 1);
        assert_eq!(rows[0].get_str("abstract_sku").unwrap(), "001");
        assert_eq!(rows[0].get_optional_str("new_from").unwrap(), None);
        assert_eq!(rows[1].get_optional_str("color_code").unwrap(), None);
        assert_eq!(rows[1].get_optional_str("new_from").unwrap(), Some("2030-01-01"));
    }

    #[test]
    fn test_read_rows_short_record_fills_null() {
        let csv = "abstract_sku,color_code,category_key\n001\n";

        let rows = read_rows(csv.as_bytes()).unwrap();

        assert_eq!(rows[0].len(), 3);
        assert_eq!(rows[0].get_optional_str("category_key").unwrap(), None);
    }

    #[test]
    fn test_read_all_skips_blank_rows() {
        let mut temp_file = Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(temp_file, "abstract_sku,color_code").unwrap();
        writeln!(temp_file, "001,#FF0000").unwrap();
        writeln!(temp_file, ",").unwrap(); // 空行
        writeln!(temp_file, "002,#00FF00").unwrap();

        let rows = CsvRowReader::new(temp_file.path()).read_all().unwrap();

        // 空行被跳过,但行号保持文件位置
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].row_number(), 3);
    }

    #[test]
    fn test_read_rows_empty_line_keeps_file_row_number() {
        let csv = "abstract_sku\n001\n\n002\n\n\n003\n";

        let rows = read_rows(csv.as_bytes()).unwrap();

        let numbers: Vec<usize> = rows.iter().map(|r| r.row_number()).collect();
        assert_eq!(numbers, vec![1, 3, 6]);
        assert_eq!(rows[1].get_str("abstract_sku").unwrap(), "002");
    }

    #[test]
    fn test_read_all_file_not_found() {
        let result = CsvRowReader::new("non_existent.csv").read_all();
        assert!(matches!(result, Err(ImportError::FileNotFound(_))));
    }

    #[test]
    fn test_read_all_unsupported_format() {
        let temp_file = Builder::new().suffix(".xlsx").tempfile().unwrap();

        let result = CsvRowReader::new(temp_file.path()).read_all();

        assert!(matches!(result, Err(ImportError::UnsupportedFormat(ext)) if ext == "xlsx"));
    }
}
