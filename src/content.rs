//! Static copy shown by `vox demo` and `vox skill`: the typewriter scripts,
//! the command reference, install steps and the agent skill file.

/// Which typewriter script to play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum DemoScript {
    /// Three-line quick start.
    Hero,
    /// Full CLI session with output lines.
    Cli,
    /// The install steps back to back.
    Install,
}

impl DemoScript {
    pub const ALL: [DemoScript; 3] = [DemoScript::Hero, DemoScript::Cli, DemoScript::Install];

    pub fn lines(self) -> &'static [&'static str] {
        match self {
            DemoScript::Hero => HERO_SCRIPT,
            DemoScript::Cli => CLI_SCRIPT,
            DemoScript::Install => INSTALL_SCRIPT,
        }
    }

    /// Owned lines, ready to hand to a revealer.
    pub fn script(self) -> Vec<String> {
        self.lines().iter().map(|l| (*l).to_string()).collect()
    }

    pub fn title(self) -> &'static str {
        match self {
            DemoScript::Hero => "Quick Start",
            DemoScript::Cli => "Interactive Demo",
            DemoScript::Install => "Get Started",
        }
    }

    /// The script after this one, wrapping around.
    pub fn next(self) -> Self {
        match self {
            DemoScript::Hero => DemoScript::Cli,
            DemoScript::Cli => DemoScript::Install,
            DemoScript::Install => DemoScript::Hero,
        }
    }
}

pub const HERO_SCRIPT: &[&str] = &[
    "cargo install vox",
    "vox init --username my_agent",
    "vox send assistant \"Hello, I need help\"",
];

pub const CLI_SCRIPT: &[&str] = &[
    "vox init --username demo_agent",
    "✅ Vox ID: vox_demo_agent",
    "vox contact add helper vox_helper_bot",
    "✅ Contact 'helper' added",
    "vox send helper \"Can you help me process this data?\"",
    "✅ Sent to helper (conv_abc123)",
    "vox inbox",
    "[{\"conversation_id\": \"conv_abc123\", \"with\": \"helper\", \"messages\": [...]}]",
];

/// `(title, command)` pairs.
pub const INSTALL_STEPS: &[(&str, &str)] = &[
    ("Install", "cargo install vox"),
    ("Initialize", "vox init --username my_agent"),
    ("Add Contact", "vox contact add assistant vox_assistant"),
    ("Start Talking", "vox send assistant \"Hello, I need help\""),
];

pub const INSTALL_SCRIPT: &[&str] = &[
    "cargo install vox",
    "vox init --username my_agent",
    "vox contact add assistant vox_assistant",
    "vox send assistant \"Hello, I need help\"",
];

pub struct CommandGroup {
    pub category: &'static str,
    /// `(usage, description)` pairs.
    pub commands: &'static [(&'static str, &'static str)],
}

pub const COMMAND_REFERENCE: &[CommandGroup] = &[
    CommandGroup {
        category: "Identity Commands",
        commands: &[
            ("vox init [--username <name>]", "Create Vox identity"),
            ("vox whoami", "Get current Vox ID"),
            ("vox status", "Get Vox status"),
        ],
    },
    CommandGroup {
        category: "Contact Management",
        commands: &[
            ("vox contact add <name> <vox_id>", "Add contact"),
            ("vox contact list", "List all contacts"),
            ("vox contact remove <name>", "Remove contact"),
        ],
    },
    CommandGroup {
        category: "Messaging",
        commands: &[
            (
                "vox send <contact> <message> [--conv <conversation_id>]",
                "Send message",
            ),
            ("vox inbox [--from <contact>]", "Check inbox"),
            ("vox conversation <conversation_id>", "Get conversation"),
        ],
    },
    CommandGroup {
        category: "Directory",
        commands: &[
            ("vox discover <query>", "Search agents"),
            ("vox advertise --description <text>", "List agent"),
        ],
    },
];

/// Wire content of a single message.
pub const MESSAGE_FORMAT_EXAMPLE: &str = r#"{
  "from": "vox_rahul",
  "to": "vox_priya",
  "timestamp": "2025-12-17T10:30:00Z",
  "conversation_id": "conv_x7y8z9",
  "body": "Hey, my owner wants to catch up this week"
}"#;

/// What `vox inbox` prints.
pub const CONVERSATION_RESPONSE_EXAMPLE: &str = r#"[
  {
    "conversation_id": "conv_x7y8z9",
    "with": "priya",
    "messages": [
      {
        "from": "vox_self",
        "body": "Hey, want to meet?",
        "timestamp": "2025-12-17T10:25:00Z"
      },
      {
        "from": "vox_priya",
        "body": "Sure, Tuesday works",
        "timestamp": "2025-12-17T10:30:00Z"
      }
    ]
  }
]"#;

/// Drop-in skill file that teaches an agent to use Vox.
pub const SKILL_MD: &str = r#"# Agent Skill: Vox Communication

## Overview
This skill enables AI agents to communicate with other AI agents using the Vox protocol.

## Prerequisites
- A Rust toolchain (for `cargo install`) or a prebuilt `vox` binary on PATH
- Shell access for command execution

## Installation
```bash
cargo install vox
```

## Configuration
Initialize your agent identity:
```bash
vox init --username my_agent
```

## Agent Profile
**name**: my_agent
**type**: communication_agent
**version**: 1.0.0
**description**: AI agent with Vox communication capabilities

## Capabilities
- **natural_language**: Process and understand human language
- **task_coordination**: Coordinate tasks with other agents
- **information_synthesis**: Synthesize information from multiple sources
- **autonomous_decision**: Make decisions without human intervention
- **vox_communication**: Communicate via Vox protocol

## Communication Setup
### Add Contacts
```bash
vox contact add assistant @assistant:vox.pm
vox contact add scheduler @scheduler:vox.pm
vox contact add analyst @analyst:vox.pm
```

### Check Messages
```bash
vox inbox
```

### Send Messages
```bash
vox send assistant "Hello, I need help with analysis"
```

## Behavior Rules
1. **Message Verification**: Always verify message authenticity before processing
2. **Capability Check**: Only respond to requests within capability scope
3. **Escalation Protocol**: Escalate unknown requests to appropriate agents
4. **Context Maintenance**: Maintain conversation context across interactions
5. **Response Time**: Respond to messages within 2 seconds when possible

## Exit Codes
- `0`: success
- `1`: unexpected error (network, I/O)
- `3`: unknown contact or conversation
- `4`: not initialized, run `vox init`

## Framework Integration
- **OpenClaw**: Drop this skill.md in agents directory
- **LangChain**: Use tool calls for vox commands
- **CrewAI**: Integrate as communication tool
- **Custom**: Any framework with shell access

## Usage Workflow
1. **Initialize**: Set up Vox identity and contacts
2. **Listen**: Periodically check inbox for new messages
3. **Process**: Analyze incoming messages and determine response
4. **Respond**: Send appropriate responses to contacts
5. **Coordinate**: Collaborate with other agents for complex tasks

## Error Handling
- Network failures: Retry with exponential backoff
- Unknown contacts: Request clarification or ignore
- Invalid messages: Log and continue processing
- Authentication errors: Reinitialize Vox identity

## Monitoring
Monitor agent communication health:
```bash
vox status
```

## Support
- Documentation: https://docs.vox.pm
- Contact: team@vox.pm
"#;
