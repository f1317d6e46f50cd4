//! Concrete parse tree for architecture descriptions.
//!
//! Node kinds and token kinds are closed enums so every traversal is a plain
//! `match`. Token kinds double as the lexer definition.

use logos::Logos;
use serde::Serialize;

/// Tag of an interior parse-tree node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Ann,
    InputLayer,
    OutputLayer,
    HiddenLayer,
    LayerType,
    LayerParam,
    InputParam,
    OutputParam,
    ActivationFn,
    KernelInitializer,
    DilationList,
}

impl NodeKind {
    pub fn name(self) -> &'static str {
        match self {
            NodeKind::Ann => "ann",
            NodeKind::InputLayer => "input_layer",
            NodeKind::OutputLayer => "output_layer",
            NodeKind::HiddenLayer => "hidden_layer",
            NodeKind::LayerType => "layer_type",
            NodeKind::LayerParam => "layer_param",
            NodeKind::InputParam => "input_param",
            NodeKind::OutputParam => "output_param",
            NodeKind::ActivationFn => "activation_fn",
            NodeKind::KernelInitializer => "kernel_initializer",
            NodeKind::DilationList => "dilation_list",
        }
    }
}

/// Terminal types of the architecture language
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"#[^\n]*")]
pub enum TokenKind {
    // Structure
    #[token("neuralnet")]
    Neuralnet,
    #[token("input")]
    Input,
    #[token("output")]
    Output,
    #[token("{")]
    Lbrace,
    #[token("}")]
    Rbrace,
    #[token("[")]
    Lsqb,
    #[token("]")]
    Rsqb,
    #[token("=")]
    Equal,
    #[token(";")]
    Semicolon,
    #[token(",")]
    Comma,

    // Layer types
    #[token("dense")]
    Dense,
    #[token("lstm")]
    Lstm,
    #[token("gru")]
    Gru,
    #[token("conv1d")]
    Conv1d,
    #[token("tcn")]
    Tcn,
    #[token("attention")]
    Attention,
    #[token("esn")]
    Esn,
    #[token("max_pooling")]
    MaxPooling,
    #[token("avg_pooling")]
    AvgPooling,
    #[token("global_pooling")]
    GlobalPooling,
    #[token("batch_norm")]
    BatchNorm,
    #[token("layer_norm")]
    LayerNorm,
    #[token("instance_norm")]
    InstanceNorm,

    // Parameter names
    #[token("features")]
    Features,
    #[token("sequence_length")]
    SequenceLength,
    #[token("units")]
    Units,
    #[token("filters")]
    Filters,
    #[token("heads")]
    Heads,
    #[token("kernel_size")]
    KernelSize,
    #[token("strides")]
    Strides,
    #[token("pool_size")]
    PoolSize,
    #[token("dilation_rate")]
    DilationRate,
    #[token("axis")]
    Axis,
    #[token("dropout")]
    Dropout,
    #[token("recurrent_dropout")]
    RecurrentDropout,
    #[token("l1")]
    L1,
    #[token("l2")]
    L2,
    #[token("leak_rate")]
    LeakRate,
    #[token("spectral_radius")]
    SpectralRadius,
    #[token("input_scaling")]
    InputScaling,
    #[token("momentum")]
    Momentum,
    #[token("epsilon")]
    Epsilon,
    #[token("activation")]
    Activation,
    #[token("kernel_init")]
    KernelInit,
    #[token("padding")]
    Padding,
    #[token("pool_type")]
    PoolType,
    #[token("dilations")]
    Dilations,

    // Activations
    #[token("linear")]
    Linear,
    #[token("relu")]
    Relu,
    #[token("sigmoid")]
    Sigmoid,
    #[token("tanh")]
    Tanh,
    #[token("softmax")]
    Softmax,
    #[token("swish")]
    Swish,
    #[token("gelu")]
    Gelu,
    #[token("leaky_relu")]
    LeakyRelu,
    #[token("elu")]
    Elu,

    // Initializers
    #[token("glorot_uniform")]
    GlorotUniform,
    #[token("glorot_normal")]
    GlorotNormal,
    #[token("he_uniform")]
    HeUniform,
    #[token("he_normal")]
    HeNormal,
    #[token("random_normal")]
    RandomNormal,

    // Padding modes
    #[token("causal")]
    Causal,
    #[token("same")]
    Same,
    #[token("valid")]
    Valid,

    // Pool types
    #[token("avg")]
    Avg,
    #[token("max")]
    Max,
    #[token("min")]
    Min,

    // Numbers
    #[regex(r"-?[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?")]
    #[regex(r"-?[0-9]+[eE][+-]?[0-9]+")]
    Float,
    #[regex(r"-?[0-9]+")]
    Int,
}

/// What a parameter's value looks like in source text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueShape {
    Number,
    Activation,
    Initializer,
    Padding,
    PoolType,
    DilationList,
}

impl TokenKind {
    /// Terminal-type name, upper case (`UNITS`, `LEAKY_RELU`, `INT`)
    pub fn name(self) -> &'static str {
        use TokenKind::*;
        match self {
            Neuralnet => "NEURALNET",
            Input => "INPUT",
            Output => "OUTPUT",
            Lbrace => "LBRACE",
            Rbrace => "RBRACE",
            Lsqb => "LSQB",
            Rsqb => "RSQB",
            Equal => "EQUAL",
            Semicolon => "SEMICOLON",
            Comma => "COMMA",
            Dense => "DENSE",
            Lstm => "LSTM",
            Gru => "GRU",
            Conv1d => "CONV1D",
            Tcn => "TCN",
            Attention => "ATTENTION",
            Esn => "ESN",
            MaxPooling => "MAX_POOLING",
            AvgPooling => "AVG_POOLING",
            GlobalPooling => "GLOBAL_POOLING",
            BatchNorm => "BATCH_NORM",
            LayerNorm => "LAYER_NORM",
            InstanceNorm => "INSTANCE_NORM",
            Features => "FEATURES",
            SequenceLength => "SEQUENCE_LENGTH",
            Units => "UNITS",
            Filters => "FILTERS",
            Heads => "HEADS",
            KernelSize => "KERNEL_SIZE",
            Strides => "STRIDES",
            PoolSize => "POOL_SIZE",
            DilationRate => "DILATION_RATE",
            Axis => "AXIS",
            Dropout => "DROPOUT",
            RecurrentDropout => "RECURRENT_DROPOUT",
            L1 => "L1",
            L2 => "L2",
            LeakRate => "LEAK_RATE",
            SpectralRadius => "SPECTRAL_RADIUS",
            InputScaling => "INPUT_SCALING",
            Momentum => "MOMENTUM",
            Epsilon => "EPSILON",
            Activation => "ACTIVATION",
            KernelInit => "KERNEL_INIT",
            Padding => "PADDING",
            PoolType => "POOL_TYPE",
            Dilations => "DILATIONS",
            Linear => "LINEAR",
            Relu => "RELU",
            Sigmoid => "SIGMOID",
            Tanh => "TANH",
            Softmax => "SOFTMAX",
            Swish => "SWISH",
            Gelu => "GELU",
            LeakyRelu => "LEAKY_RELU",
            Elu => "ELU",
            GlorotUniform => "GLOROT_UNIFORM",
            GlorotNormal => "GLOROT_NORMAL",
            HeUniform => "HE_UNIFORM",
            HeNormal => "HE_NORMAL",
            RandomNormal => "RANDOM_NORMAL",
            Causal => "CAUSAL",
            Same => "SAME",
            Valid => "VALID",
            Avg => "AVG",
            Max => "MAX",
            Min => "MIN",
            Float => "FLOAT",
            Int => "INT",
        }
    }

    pub fn is_layer_type(self) -> bool {
        use TokenKind::*;
        matches!(
            self,
            Dense
                | Lstm
                | Gru
                | Conv1d
                | Tcn
                | Attention
                | Esn
                | MaxPooling
                | AvgPooling
                | GlobalPooling
                | BatchNorm
                | LayerNorm
                | InstanceNorm
        )
    }

    pub fn is_activation(self) -> bool {
        use TokenKind::*;
        matches!(
            self,
            Linear | Relu | Sigmoid | Tanh | Softmax | Swish | Gelu | LeakyRelu | Elu
        )
    }

    pub fn is_initializer(self) -> bool {
        use TokenKind::*;
        matches!(
            self,
            GlorotUniform | GlorotNormal | HeUniform | HeNormal | RandomNormal
        )
    }

    pub fn is_padding(self) -> bool {
        matches!(self, TokenKind::Causal | TokenKind::Same | TokenKind::Valid)
    }

    pub fn is_pool_type(self) -> bool {
        matches!(self, TokenKind::Avg | TokenKind::Max | TokenKind::Min)
    }

    pub fn is_number(self) -> bool {
        matches!(self, TokenKind::Int | TokenKind::Float)
    }

    /// Keywords that stand for a fixed lower-case string value
    pub fn is_keyword_value(self) -> bool {
        self.is_layer_type()
            || self.is_activation()
            || self.is_initializer()
            || self.is_padding()
            || self.is_pool_type()
    }

    /// The value shape if this token names a parameter
    pub fn value_shape(self) -> Option<ValueShape> {
        use TokenKind::*;
        match self {
            Features | SequenceLength | Units | Filters | Heads | KernelSize | Strides
            | PoolSize | DilationRate | Axis | Dropout | RecurrentDropout | L1 | L2
            | LeakRate | SpectralRadius | InputScaling | Momentum | Epsilon => {
                Some(ValueShape::Number)
            }
            Activation => Some(ValueShape::Activation),
            KernelInit => Some(ValueShape::Initializer),
            Padding => Some(ValueShape::Padding),
            PoolType => Some(ValueShape::PoolType),
            Dilations => Some(ValueShape::DilationList),
            _ => None,
        }
    }

    pub fn is_param_name(self) -> bool {
        self.value_shape().is_some()
    }
}

/// A lexical token with its source position (1-based)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn new(kind: TokenKind, value: &str, line: usize, column: usize) -> Self {
        Token {
            kind,
            value: value.to_string(),
            line,
            column,
        }
    }
}

/// Child of a node: either a subtree or a token
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Child {
    Node(Node),
    Token(Token),
}

impl Child {
    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Child::Node(node) => Some(node),
            Child::Token(_) => None,
        }
    }

    pub fn as_token(&self) -> Option<&Token> {
        match self {
            Child::Token(token) => Some(token),
            Child::Node(_) => None,
        }
    }
}

/// Interior parse-tree node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    pub kind: NodeKind,
    pub children: Vec<Child>,
}

impl Node {
    pub fn new(kind: NodeKind, children: Vec<Child>) -> Self {
        Node { kind, children }
    }

    /// Direct child nodes of the given kind
    pub fn nodes_of(&self, kind: NodeKind) -> impl Iterator<Item = &Node> {
        self.children
            .iter()
            .filter_map(Child::as_node)
            .filter(move |n| n.kind == kind)
    }

    /// First descendant (depth first, self included) of the given kind
    pub fn find(&self, kind: NodeKind) -> Option<&Node> {
        if self.kind == kind {
            return Some(self);
        }
        self.children
            .iter()
            .filter_map(Child::as_node)
            .find_map(|n| n.find(kind))
    }

    /// First token in this subtree
    pub fn first_token(&self) -> Option<&Token> {
        self.children.iter().find_map(|child| match child {
            Child::Token(token) => Some(token),
            Child::Node(node) => node.first_token(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<TokenKind> {
        TokenKind::lexer(text).map(|t| t.unwrap()).collect()
    }

    #[test]
    fn test_longest_keyword_wins() {
        assert_eq!(
            kinds("input input_scaling max max_pooling l1"),
            vec![
                TokenKind::Input,
                TokenKind::InputScaling,
                TokenKind::Max,
                TokenKind::MaxPooling,
                TokenKind::L1
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            kinds("64 -1 0.25 1e-3 1.5E+2"),
            vec![
                TokenKind::Int,
                TokenKind::Int,
                TokenKind::Float,
                TokenKind::Float,
                TokenKind::Float
            ]
        );
    }

    #[test]
    fn test_comments_and_unknown_words() {
        assert_eq!(kinds("# header\ndense"), vec![TokenKind::Dense]);
        assert!(TokenKind::lexer("densely").any(|t| t.is_err()));
    }

    #[test]
    fn test_names_lower_case_to_keywords() {
        for kind in [TokenKind::LeakyRelu, TokenKind::MaxPooling, TokenKind::KernelInit] {
            let lower = kind.name().to_ascii_lowercase();
            assert_eq!(kinds(&lower), vec![kind]);
        }
    }

    #[test]
    fn test_find_and_first_token() {
        let ty = Node::new(
            NodeKind::LayerType,
            vec![Child::Token(Token::new(TokenKind::Dense, "dense", 3, 5))],
        );
        let hidden = Node::new(NodeKind::HiddenLayer, vec![Child::Node(ty)]);
        assert_eq!(hidden.find(NodeKind::LayerType).unwrap().kind, NodeKind::LayerType);
        assert_eq!(hidden.first_token().unwrap().line, 3);
        assert_eq!(hidden.nodes_of(NodeKind::LayerType).count(), 1);
        assert!(hidden.find(NodeKind::DilationList).is_none());
    }
}
