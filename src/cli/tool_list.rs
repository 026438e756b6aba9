use crate::core::templates::JSON_TEMPLATES;
use crate::core::tools::TOOLS;

pub fn list_tools() {
    println!("🧰 Available Tools");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for tool in TOOLS {
        println!("  • {} ({})", tool.name, tool.id);
        println!("    {}", tool.description);
        println!("    default model: {}", tool.default_model);
    }
}

pub fn list_templates() {
    println!("📋 JSON Templates");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for template in JSON_TEMPLATES {
        println!("  • {} ({})", template.name, template.id);
        println!("    {}", template.description);
        for (field, hint) in template.schema {
            println!("      {field}: {hint}");
        }
    }
}
