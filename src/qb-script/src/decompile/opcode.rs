//! Script opcodes
//!
//! Only the opcodes with a known rendering are listed; every other byte is
//! reported inline by the decompiler.

/// What follows an opcode byte in the stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    None,
    /// Bytes skipped without rendering (jump offsets)
    Skip(usize),
    /// u32 checksum
    Key,
    /// i32
    Integer,
    /// u32 printed in hex
    Hex,
    /// f32
    Float,
    /// 2 x f32
    Vector2,
    /// 3 x f32
    Vector3,
    /// i32 byte length + single-byte text
    String,
    /// i32 byte length + UTF-16BE text
    WideString,
    /// u32 relative jump
    Jump,
    /// u32 count, count x u16 weights, count x u32 relative targets
    ChoiceTable,
    /// Embedded struct block
    StructBlock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    EndOfLine = 0x01,
    StartMap = 0x03,
    EndMap = 0x04,
    StartArray = 0x05,
    EndArray = 0x06,
    Equals = 0x07,
    Dot = 0x08,
    Comma = 0x09,
    Minus = 0x0a,
    Add = 0x0b,
    Divide = 0x0c,
    Multiply = 0x0d,
    OpenParen = 0x0e,
    CloseParen = 0x0f,
    LessThan = 0x12,
    LessThanEqual = 0x13,
    GreaterThan = 0x14,
    GreaterThanEqual = 0x15,
    QbKey = 0x16,
    Integer = 0x17,
    HexInteger = 0x18,
    Float = 0x1a,
    String = 0x1b,
    Vector3 = 0x1e,
    Vector2 = 0x1f,
    Begin = 0x20,
    Repeat = 0x21,
    Break = 0x22,
    Script = 0x23,
    EndScript = 0x24,
    ElseIf = 0x27,
    EndIf = 0x28,
    Return = 0x29,
    AllArgs = 0x2c,
    Local = 0x2d,
    Goto = 0x2e,
    Random = 0x2f,
    RandomRange = 0x30,
    At = 0x31,
    Or = 0x32,
    And = 0x33,
    Xor = 0x34,
    Random2 = 0x37,
    RandomRange2 = 0x38,
    Not = 0x39,
    Switch = 0x3c,
    EndSwitch = 0x3d,
    Case = 0x3e,
    Default = 0x3f,
    RandomNoRepeat = 0x40,
    RandomPermute = 0x41,
    Colon = 0x42,
    UseHeap = 0x45,
    ShortIf = 0x47,
    ShortElse = 0x48,
    ShortJump = 0x49,
    Struct = 0x4a,
    Pointer = 0x4b,
    WideString = 0x4c,
    NotEqual = 0x4d,
}

impl Opcode {
    pub fn from_byte(byte: u8) -> Option<Self> {
        use Opcode::*;
        let op = match byte {
            0x01 => EndOfLine,
            0x03 => StartMap,
            0x04 => EndMap,
            0x05 => StartArray,
            0x06 => EndArray,
            0x07 => Equals,
            0x08 => Dot,
            0x09 => Comma,
            0x0a => Minus,
            0x0b => Add,
            0x0c => Divide,
            0x0d => Multiply,
            0x0e => OpenParen,
            0x0f => CloseParen,
            0x12 => LessThan,
            0x13 => LessThanEqual,
            0x14 => GreaterThan,
            0x15 => GreaterThanEqual,
            0x16 => QbKey,
            0x17 => Integer,
            0x18 => HexInteger,
            0x1a => Float,
            0x1b => String,
            0x1e => Vector3,
            0x1f => Vector2,
            0x20 => Begin,
            0x21 => Repeat,
            0x22 => Break,
            0x23 => Script,
            0x24 => EndScript,
            0x27 => ElseIf,
            0x28 => EndIf,
            0x29 => Return,
            0x2c => AllArgs,
            0x2d => Local,
            0x2e => Goto,
            0x2f => Random,
            0x30 => RandomRange,
            0x31 => At,
            0x32 => Or,
            0x33 => And,
            0x34 => Xor,
            0x37 => Random2,
            0x38 => RandomRange2,
            0x39 => Not,
            0x3c => Switch,
            0x3d => EndSwitch,
            0x3e => Case,
            0x3f => Default,
            0x40 => RandomNoRepeat,
            0x41 => RandomPermute,
            0x42 => Colon,
            0x45 => UseHeap,
            0x47 => ShortIf,
            0x48 => ShortElse,
            0x49 => ShortJump,
            0x4a => Struct,
            0x4b => Pointer,
            0x4c => WideString,
            0x4d => NotEqual,
            _ => return None,
        };
        Some(op)
    }

    #[inline]
    pub fn byte(self) -> u8 {
        self as u8
    }

    /// Fixed text emitted before any operand
    pub fn text(self) -> &'static str {
        use Opcode::*;
        match self {
            StartMap => "(map) { ",
            EndMap => " }",
            StartArray => "[",
            EndArray => "]",
            Equals => " = ",
            Dot => ".",
            Comma => ", ",
            Minus => " - ",
            Add => " + ",
            Divide => " / ",
            Multiply => " * ",
            OpenParen => "(",
            CloseParen => ")",
            LessThan => " < ",
            LessThanEqual => " <= ",
            GreaterThan => " > ",
            GreaterThanEqual => " >= ",
            Begin => "begin",
            Repeat => "repeat",
            Break => "break",
            Script => "script",
            EndScript => "endscript",
            ElseIf => "elseif",
            EndIf => "endif",
            Return => "return ",
            AllArgs => "<...>",
            Local => "local ",
            Goto => "goto ",
            Random => "random ",
            RandomRange => "randomrange ",
            At => "@",
            Or => " || ",
            And => " && ",
            Xor => " ^ ",
            Random2 => "random2 ",
            RandomRange2 => "randomrange2 ",
            Not => "!",
            Switch => "switch ",
            EndSwitch => "endswitch",
            Case => "case ",
            Default => "default:",
            RandomNoRepeat => "randomnorepeat ",
            RandomPermute => "randompermute ",
            Colon => ":",
            UseHeap => "useheap ",
            ShortIf => "if ",
            ShortElse => "else",
            Pointer => "*",
            NotEqual => " != ",
            EndOfLine | QbKey | Integer | HexInteger | Float | String | Vector3 | Vector2
            | ShortJump | Struct | WideString => "",
        }
    }

    pub fn operand(self) -> Operand {
        use Opcode::*;
        match self {
            QbKey => Operand::Key,
            Integer => Operand::Integer,
            HexInteger => Operand::Hex,
            Float => Operand::Float,
            String => Operand::String,
            Vector3 => Operand::Vector3,
            Vector2 => Operand::Vector2,
            ElseIf => Operand::Skip(4),
            Goto => Operand::Jump,
            Random => Operand::ChoiceTable,
            ShortIf | ShortElse | ShortJump => Operand::Skip(2),
            Struct => Operand::StructBlock,
            WideString => Operand::WideString,
            _ => Operand::None,
        }
    }

    /// Change to the block nesting depth
    pub fn depth_change(self) -> i32 {
        use Opcode::*;
        match self {
            StartMap | Begin | Script | ShortIf => 1,
            EndMap | Repeat | EndScript | EndIf => -1,
            Switch => 2,
            EndSwitch => -2,
            _ => 0,
        }
    }

    /// Keywords that sit one level left of the block body they close or split
    pub fn outdents(self) -> bool {
        use Opcode::*;
        matches!(
            self,
            Repeat | EndScript | ElseIf | EndIf | EndSwitch | Case | Default | ShortElse
        )
    }
}
