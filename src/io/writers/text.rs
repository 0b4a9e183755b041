//! Row-oriented, tab-separated export of grid points.
//!
//! Each exported product starts a block: a `# <product name>` line followed
//! by the column header line. Every row is one grid point.
use std::io::Write;

use crate::error::Result;
use crate::io::decoder::Value;

/// One cell of an exported row
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cell {
    /// Raw record value, written in its native representation
    Raw(Value),
    /// Derived value, NaN when it could not be produced
    Derived(f64),
    Missing,
}

pub struct TextWriter<W: Write> {
    out: W,
    no_data_text: String,
    columns: usize,
    rows: usize,
}

impl<W: Write> TextWriter<W> {
    pub fn new(out: W, no_data_text: impl Into<String>) -> Self {
        Self {
            out,
            no_data_text: no_data_text.into(),
            columns: 0,
            rows: 0,
        }
    }

    /// Start the block of one product.
    pub fn begin_product(&mut self, name: &str, columns: &[String]) -> Result<()> {
        writeln!(self.out, "# {}", name)?;
        writeln!(self.out, "{}", columns.join("\t"))?;
        self.columns = columns.len();
        Ok(())
    }

    pub fn write_row(&mut self, cells: &[Cell]) -> Result<()> {
        debug_assert_eq!(cells.len(), self.columns);
        for (i, cell) in cells.iter().enumerate() {
            if i > 0 {
                self.out.write_all(b"\t")?;
            }
            match cell {
                Cell::Raw(v) => write!(self.out, "{}", v)?,
                Cell::Derived(v) if !v.is_nan() => write!(self.out, "{}", v)?,
                Cell::Derived(_) | Cell::Missing => {
                    self.out.write_all(self.no_data_text.as_bytes())?
                }
            }
        }
        self.out.write_all(b"\n")?;
        self.rows += 1;
        Ok(())
    }

    /// Rows written so far.
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn into_inner(mut self) -> Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_blocks_and_no_data() {
        let mut w = TextWriter::new(Vec::new(), "NaN");
        let cols: Vec<String> = ["Grid_Point_ID", "Latitude", "BT_Value_X"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        w.begin_product("SM_TEST", &cols).unwrap();
        w.write_row(&[Cell::Raw(Value::U32(42)), Cell::Raw(Value::F32(1.5)), Cell::Derived(205.25)])
            .unwrap();
        w.write_row(&[Cell::Raw(Value::U32(43)), Cell::Missing, Cell::Derived(f64::NAN)])
            .unwrap();
        assert_eq!(w.rows(), 2);
        let text = String::from_utf8(w.into_inner().unwrap()).unwrap();
        assert_eq!(
            text,
            "# SM_TEST\nGrid_Point_ID\tLatitude\tBT_Value_X\n42\t1.5\t205.25\n43\tNaN\tNaN\n"
        );
    }
}
