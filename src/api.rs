//! Typed wrappers over the editor's remote API.
//!
//! Each wrapper is a single [`RpcClient::call`] whose result is narrowed
//! with [`FromValue`]; a wrong shape fails that call with
//! `RpcError::TypeMismatch` and leaves the connection alone. Methods whose
//! result is dynamic (variables, options, `vim_eval`) return the raw
//! [`Value`].

use rmpv::Value;

use crate::rpc::{RpcClient, RpcError};
use crate::value::{Buffer, FromValue, Tabpage, Window};

fn text(s: &str) -> Value {
    Value::from(s)
}

fn lines(lines: &[String]) -> Value {
    Value::Array(lines.iter().map(|l| Value::from(l.as_str())).collect())
}

impl RpcClient {
    /// Call `method` and narrow the result to `T`.
    pub async fn call_typed<T: FromValue>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T, RpcError> {
        let value = self.call(method, params).await?;
        T::from_value(value)
    }

    // ---------------------------------------------------------------------
    // UI
    // ---------------------------------------------------------------------

    /// Register as a UI of `width` x `height` cells; the editor starts
    /// sending `redraw` notifications.
    pub async fn ui_attach(&self, width: u16, height: u16, rgb: bool) -> Result<(), RpcError> {
        self.call_typed(
            "ui_attach",
            vec![Value::from(width), Value::from(height), Value::from(rgb)],
        )
        .await
    }

    pub async fn ui_detach(&self) -> Result<(), RpcError> {
        self.call_typed("ui_detach", vec![]).await
    }

    pub async fn ui_try_resize(&self, width: u16, height: u16) -> Result<(), RpcError> {
        self.call_typed("ui_try_resize", vec![Value::from(width), Value::from(height)])
            .await
    }

    // ---------------------------------------------------------------------
    // Global
    // ---------------------------------------------------------------------

    /// Queue raw keys for the editor. Returns how many bytes were consumed.
    pub async fn vim_input(&self, keys: &str) -> Result<i64, RpcError> {
        self.call_typed("vim_input", vec![text(keys)]).await
    }

    pub async fn vim_feedkeys(&self, keys: &str, mode: &str, escape_csi: bool) -> Result<(), RpcError> {
        self.call_typed(
            "vim_feedkeys",
            vec![text(keys), text(mode), Value::from(escape_csi)],
        )
        .await
    }

    pub async fn vim_command(&self, command: &str) -> Result<(), RpcError> {
        self.call_typed("vim_command", vec![text(command)]).await
    }

    pub async fn vim_command_output(&self, command: &str) -> Result<String, RpcError> {
        self.call_typed("vim_command_output", vec![text(command)]).await
    }

    pub async fn vim_eval(&self, expr: &str) -> Result<Value, RpcError> {
        self.call("vim_eval", vec![text(expr)]).await
    }

    pub async fn vim_replace_termcodes(
        &self,
        s: &str,
        from_part: bool,
        do_lt: bool,
        special: bool,
    ) -> Result<String, RpcError> {
        self.call_typed(
            "vim_replace_termcodes",
            vec![
                text(s),
                Value::from(from_part),
                Value::from(do_lt),
                Value::from(special),
            ],
        )
        .await
    }

    /// Display width of `s` in cells.
    pub async fn vim_strwidth(&self, s: &str) -> Result<i64, RpcError> {
        self.call_typed("vim_strwidth", vec![text(s)]).await
    }

    pub async fn vim_list_runtime_paths(&self) -> Result<Vec<String>, RpcError> {
        self.call_typed("vim_list_runtime_paths", vec![]).await
    }

    pub async fn vim_change_directory(&self, dir: &str) -> Result<(), RpcError> {
        self.call_typed("vim_change_directory", vec![text(dir)]).await
    }

    pub async fn vim_get_current_line(&self) -> Result<String, RpcError> {
        self.call_typed("vim_get_current_line", vec![]).await
    }

    pub async fn vim_set_current_line(&self, line: &str) -> Result<(), RpcError> {
        self.call_typed("vim_set_current_line", vec![text(line)]).await
    }

    pub async fn vim_del_current_line(&self) -> Result<(), RpcError> {
        self.call_typed("vim_del_current_line", vec![]).await
    }

    pub async fn vim_get_var(&self, name: &str) -> Result<Value, RpcError> {
        self.call("vim_get_var", vec![text(name)]).await
    }

    /// Set a global variable, returning its previous value.
    pub async fn vim_set_var(&self, name: &str, value: Value) -> Result<Value, RpcError> {
        self.call("vim_set_var", vec![text(name), value]).await
    }

    pub async fn vim_get_vvar(&self, name: &str) -> Result<Value, RpcError> {
        self.call("vim_get_vvar", vec![text(name)]).await
    }

    pub async fn vim_get_option(&self, name: &str) -> Result<Value, RpcError> {
        self.call("vim_get_option", vec![text(name)]).await
    }

    pub async fn vim_set_option(&self, name: &str, value: Value) -> Result<(), RpcError> {
        self.call_typed("vim_set_option", vec![text(name), value]).await
    }

    pub async fn vim_out_write(&self, message: &str) -> Result<(), RpcError> {
        self.call_typed("vim_out_write", vec![text(message)]).await
    }

    pub async fn vim_err_write(&self, message: &str) -> Result<(), RpcError> {
        self.call_typed("vim_err_write", vec![text(message)]).await
    }

    pub async fn vim_report_error(&self, message: &str) -> Result<(), RpcError> {
        self.call_typed("vim_report_error", vec![text(message)]).await
    }

    pub async fn vim_get_buffers(&self) -> Result<Vec<Buffer>, RpcError> {
        self.call_typed("vim_get_buffers", vec![]).await
    }

    pub async fn vim_get_current_buffer(&self) -> Result<Buffer, RpcError> {
        self.call_typed("vim_get_current_buffer", vec![]).await
    }

    pub async fn vim_set_current_buffer(&self, buffer: Buffer) -> Result<(), RpcError> {
        self.call_typed("vim_set_current_buffer", vec![buffer.into()])
            .await
    }

    pub async fn vim_get_windows(&self) -> Result<Vec<Window>, RpcError> {
        self.call_typed("vim_get_windows", vec![]).await
    }

    pub async fn vim_get_current_window(&self) -> Result<Window, RpcError> {
        self.call_typed("vim_get_current_window", vec![]).await
    }

    pub async fn vim_set_current_window(&self, window: Window) -> Result<(), RpcError> {
        self.call_typed("vim_set_current_window", vec![window.into()])
            .await
    }

    pub async fn vim_get_tabpages(&self) -> Result<Vec<Tabpage>, RpcError> {
        self.call_typed("vim_get_tabpages", vec![]).await
    }

    pub async fn vim_get_current_tabpage(&self) -> Result<Tabpage, RpcError> {
        self.call_typed("vim_get_current_tabpage", vec![]).await
    }

    pub async fn vim_set_current_tabpage(&self, tabpage: Tabpage) -> Result<(), RpcError> {
        self.call_typed("vim_set_current_tabpage", vec![tabpage.into()])
            .await
    }

    /// Ask for notifications named `event`.
    pub async fn vim_subscribe(&self, event: &str) -> Result<(), RpcError> {
        self.call_typed("vim_subscribe", vec![text(event)]).await
    }

    pub async fn vim_unsubscribe(&self, event: &str) -> Result<(), RpcError> {
        self.call_typed("vim_unsubscribe", vec![text(event)]).await
    }

    /// Colour value for a colour name, or -1 if unknown.
    pub async fn vim_name_to_color(&self, name: &str) -> Result<i64, RpcError> {
        self.call_typed("vim_name_to_color", vec![text(name)]).await
    }

    /// Map of colour name to RGB value.
    pub async fn vim_get_color_map(&self) -> Result<Value, RpcError> {
        self.call("vim_get_color_map", vec![]).await
    }

    /// `[channel_id, api_metadata]`.
    pub async fn vim_get_api_info(&self) -> Result<Value, RpcError> {
        self.call("vim_get_api_info", vec![]).await
    }

    // ---------------------------------------------------------------------
    // Buffer
    // ---------------------------------------------------------------------

    pub async fn buffer_line_count(&self, buffer: Buffer) -> Result<i64, RpcError> {
        self.call_typed("buffer_line_count", vec![buffer.into()]).await
    }

    pub async fn buffer_get_line(&self, buffer: Buffer, index: i64) -> Result<String, RpcError> {
        self.call_typed("buffer_get_line", vec![buffer.into(), Value::from(index)])
            .await
    }

    pub async fn buffer_set_line(
        &self,
        buffer: Buffer,
        index: i64,
        line: &str,
    ) -> Result<(), RpcError> {
        self.call_typed(
            "buffer_set_line",
            vec![buffer.into(), Value::from(index), text(line)],
        )
        .await
    }

    pub async fn buffer_del_line(&self, buffer: Buffer, index: i64) -> Result<(), RpcError> {
        self.call_typed("buffer_del_line", vec![buffer.into(), Value::from(index)])
            .await
    }

    /// Lines `start..end`, with either bound optionally inclusive.
    pub async fn buffer_get_line_slice(
        &self,
        buffer: Buffer,
        start: i64,
        end: i64,
        include_start: bool,
        include_end: bool,
    ) -> Result<Vec<String>, RpcError> {
        self.call_typed(
            "buffer_get_line_slice",
            vec![
                buffer.into(),
                Value::from(start),
                Value::from(end),
                Value::from(include_start),
                Value::from(include_end),
            ],
        )
        .await
    }

    pub async fn buffer_set_line_slice(
        &self,
        buffer: Buffer,
        start: i64,
        end: i64,
        include_start: bool,
        include_end: bool,
        replacement: &[String],
    ) -> Result<(), RpcError> {
        self.call_typed(
            "buffer_set_line_slice",
            vec![
                buffer.into(),
                Value::from(start),
                Value::from(end),
                Value::from(include_start),
                Value::from(include_end),
                lines(replacement),
            ],
        )
        .await
    }

    /// Insert `new_lines` before line `index`.
    pub async fn buffer_insert(
        &self,
        buffer: Buffer,
        index: i64,
        new_lines: &[String],
    ) -> Result<(), RpcError> {
        self.call_typed(
            "buffer_insert",
            vec![buffer.into(), Value::from(index), lines(new_lines)],
        )
        .await
    }

    pub async fn buffer_get_var(&self, buffer: Buffer, name: &str) -> Result<Value, RpcError> {
        self.call("buffer_get_var", vec![buffer.into(), text(name)])
            .await
    }

    pub async fn buffer_set_var(
        &self,
        buffer: Buffer,
        name: &str,
        value: Value,
    ) -> Result<Value, RpcError> {
        self.call("buffer_set_var", vec![buffer.into(), text(name), value])
            .await
    }

    pub async fn buffer_get_option(&self, buffer: Buffer, name: &str) -> Result<Value, RpcError> {
        self.call("buffer_get_option", vec![buffer.into(), text(name)])
            .await
    }

    pub async fn buffer_set_option(
        &self,
        buffer: Buffer,
        name: &str,
        value: Value,
    ) -> Result<(), RpcError> {
        self.call_typed("buffer_set_option", vec![buffer.into(), text(name), value])
            .await
    }

    pub async fn buffer_get_number(&self, buffer: Buffer) -> Result<i64, RpcError> {
        self.call_typed("buffer_get_number", vec![buffer.into()]).await
    }

    pub async fn buffer_get_name(&self, buffer: Buffer) -> Result<String, RpcError> {
        self.call_typed("buffer_get_name", vec![buffer.into()]).await
    }

    pub async fn buffer_is_valid(&self, buffer: Buffer) -> Result<bool, RpcError> {
        self.call_typed("buffer_is_valid", vec![buffer.into()]).await
    }

    /// `(row, col)` of mark `name`.
    pub async fn buffer_get_mark(&self, buffer: Buffer, name: &str) -> Result<(i64, i64), RpcError> {
        self.call_typed("buffer_get_mark", vec![buffer.into(), text(name)])
            .await
    }

    // ---------------------------------------------------------------------
    // Window
    // ---------------------------------------------------------------------

    pub async fn window_get_buffer(&self, window: Window) -> Result<Buffer, RpcError> {
        self.call_typed("window_get_buffer", vec![window.into()]).await
    }

    /// `(row, col)`, 1-based row.
    pub async fn window_get_cursor(&self, window: Window) -> Result<(i64, i64), RpcError> {
        self.call_typed("window_get_cursor", vec![window.into()]).await
    }

    pub async fn window_set_cursor(
        &self,
        window: Window,
        (row, col): (i64, i64),
    ) -> Result<(), RpcError> {
        self.call_typed(
            "window_set_cursor",
            vec![
                window.into(),
                Value::Array(vec![Value::from(row), Value::from(col)]),
            ],
        )
        .await
    }

    pub async fn window_get_height(&self, window: Window) -> Result<i64, RpcError> {
        self.call_typed("window_get_height", vec![window.into()]).await
    }

    pub async fn window_set_height(&self, window: Window, height: i64) -> Result<(), RpcError> {
        self.call_typed("window_set_height", vec![window.into(), Value::from(height)])
            .await
    }

    pub async fn window_get_width(&self, window: Window) -> Result<i64, RpcError> {
        self.call_typed("window_get_width", vec![window.into()]).await
    }

    pub async fn window_set_width(&self, window: Window, width: i64) -> Result<(), RpcError> {
        self.call_typed("window_set_width", vec![window.into(), Value::from(width)])
            .await
    }

    pub async fn window_get_var(&self, window: Window, name: &str) -> Result<Value, RpcError> {
        self.call("window_get_var", vec![window.into(), text(name)])
            .await
    }

    pub async fn window_set_var(
        &self,
        window: Window,
        name: &str,
        value: Value,
    ) -> Result<Value, RpcError> {
        self.call("window_set_var", vec![window.into(), text(name), value])
            .await
    }

    pub async fn window_get_option(&self, window: Window, name: &str) -> Result<Value, RpcError> {
        self.call("window_get_option", vec![window.into(), text(name)])
            .await
    }

    pub async fn window_set_option(
        &self,
        window: Window,
        name: &str,
        value: Value,
    ) -> Result<(), RpcError> {
        self.call_typed("window_set_option", vec![window.into(), text(name), value])
            .await
    }

    /// `(row, col)` of the window on screen.
    pub async fn window_get_position(&self, window: Window) -> Result<(i64, i64), RpcError> {
        self.call_typed("window_get_position", vec![window.into()]).await
    }

    pub async fn window_get_tabpage(&self, window: Window) -> Result<Tabpage, RpcError> {
        self.call_typed("window_get_tabpage", vec![window.into()]).await
    }

    pub async fn window_is_valid(&self, window: Window) -> Result<bool, RpcError> {
        self.call_typed("window_is_valid", vec![window.into()]).await
    }

    // ---------------------------------------------------------------------
    // Tabpage
    // ---------------------------------------------------------------------

    pub async fn tabpage_get_windows(&self, tabpage: Tabpage) -> Result<Vec<Window>, RpcError> {
        self.call_typed("tabpage_get_windows", vec![tabpage.into()]).await
    }

    pub async fn tabpage_get_window(&self, tabpage: Tabpage) -> Result<Window, RpcError> {
        self.call_typed("tabpage_get_window", vec![tabpage.into()]).await
    }

    pub async fn tabpage_get_var(&self, tabpage: Tabpage, name: &str) -> Result<Value, RpcError> {
        self.call("tabpage_get_var", vec![tabpage.into(), text(name)])
            .await
    }

    pub async fn tabpage_set_var(
        &self,
        tabpage: Tabpage,
        name: &str,
        value: Value,
    ) -> Result<Value, RpcError> {
        self.call("tabpage_set_var", vec![tabpage.into(), text(name), value])
            .await
    }

    pub async fn tabpage_is_valid(&self, tabpage: Tabpage) -> Result<bool, RpcError> {
        self.call_typed("tabpage_is_valid", vec![tabpage.into()]).await
    }
}
