//! 脚本语句拼接工具。

#[derive(Debug, Default, Clone)]
pub(crate) struct StringBuilder {
    buf: String,
}

impl StringBuilder {
    pub(crate) fn new() -> Self {
        Self { buf: String::new() }
    }

    pub(crate) fn write_str(&mut self, s: &str) {
        self.buf.push_str(s);
    }

    pub(crate) fn write_char(&mut self, c: char) {
        self.buf.push(c);
    }

    /// 用 `sep` 连接 `items` 写入（不跳过空串，列与值必须一一对应）。
    pub(crate) fn write_joined(&mut self, items: &[String], sep: &str) {
        for (i, s) in items.iter().enumerate() {
            if i > 0 {
                self.buf.push_str(sep);
            }
            self.buf.push_str(s);
        }
    }

    /// 追加另一个 builder 的内容。
    pub(crate) fn append(&mut self, other: StringBuilder) {
        self.buf.push_str(&other.buf);
    }

    pub(crate) fn into_string(self) -> String {
        self.buf
    }
}
