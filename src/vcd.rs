//! Value Change Dump output.
//!
//! [`VcdWriter`] writes the header once all signals are declared, then one
//! timestamp line per simulation time with changes, followed by the changes.

use std::io::Write;

use crate::error::SimError;
use crate::value::LogicVec;

pub struct VcdWriter<W: Write> {
    writer: W,
    // (signal handle, id code, width)
    ids: Vec<(usize, String, u32)>,
    timescale: String,
    current_time: Option<u64>,
}

impl<W: Write> VcdWriter<W> {
    /// `timescale` is the simulator step, e.g. `1ps`.
    pub fn new(writer: W, timescale: &str) -> Self {
        Self {
            writer,
            ids: Vec::new(),
            timescale: timescale.to_string(),
            current_time: None,
        }
    }

    /// Identifier codes are printable ASCII starting at `!`.
    fn make_id_code(index: usize) -> String {
        let mut result = String::new();
        let mut idx = index;
        loop {
            result.push((b'!' + (idx % 94) as u8) as char);
            idx /= 94;
            if idx == 0 {
                break;
            }
            idx -= 1;
        }
        result
    }

    fn id_of(&self, handle: usize) -> Option<&(usize, String, u32)> {
        self.ids.iter().find(|(h, _, _)| *h == handle)
    }

    /// Writes the header and the initial values of all `signals`.
    pub fn begin(
        &mut self,
        scope: &str,
        signals: &[(usize, &str, &LogicVec)],
    ) -> Result<(), SimError> {
        writeln!(self.writer, "$version tbkit $end")?;
        writeln!(self.writer, "$timescale {} $end", self.timescale)?;
        writeln!(self.writer, "$scope module {} $end", scope)?;
        for (i, (handle, name, value)) in signals.iter().enumerate() {
            let code = Self::make_id_code(i);
            writeln!(self.writer, "$var wire {} {} {} $end", value.width(), code, name)?;
            self.ids.push((*handle, code, value.width()));
        }
        writeln!(self.writer, "$upscope $end")?;
        writeln!(self.writer, "$enddefinitions $end")?;
        writeln!(self.writer, "#0")?;
        writeln!(self.writer, "$dumpvars")?;
        for (handle, _, value) in signals {
            self.write_value(*handle, value)?;
        }
        writeln!(self.writer, "$end")?;
        self.current_time = Some(0);
        Ok(())
    }

    pub fn change(&mut self, time: u64, handle: usize, value: &LogicVec) -> Result<(), SimError> {
        if self.current_time != Some(time) {
            writeln!(self.writer, "#{}", time)?;
            self.current_time = Some(time);
        }
        self.write_value(handle, value)
    }

    fn write_value(&mut self, handle: usize, value: &LogicVec) -> Result<(), SimError> {
        let Some((_, code, width)) = self.id_of(handle) else {
            return Err(SimError::InvalidHandle(handle));
        };
        let line = if *width == 1 {
            format!("{}{}", value, code)
        } else {
            format!("b{} {}", value, code)
        };
        writeln!(self.writer, "{}", line)?;
        Ok(())
    }

    pub fn finish(&mut self) -> Result<(), SimError> {
        self.writer.flush()?;
        Ok(())
    }
}
